//! A record upserted and then queried with its own vector comes back first,
//! at the metric's best possible score.

use crate::common::*;
use proptest::prelude::*;

fn self_match(metric: MetricType, vector: Vec<f32>) -> SearchHit {
    let dim = vector.len();
    let spec = CollectionSpec::new("images", dim)
        .with_index(IndexSpec::ivf_flat(128).with_metric(metric));
    let store = store_with(&spec);

    let writer = UpsertClient::new(memory_connection(&store), "images").unwrap();
    writer
        .upsert(Some("target"), vector.clone(), path_sidecar("target.jpg"))
        .unwrap();

    let searcher =
        SearchClient::new(memory_connection(&store), "images", SearchOverrides::default())
            .unwrap();
    let hits = searcher.search(&vector, Some(1)).unwrap();
    assert_eq!(hits.len(), 1);
    hits.into_iter().next().unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn l2_self_match_scores_zero(vector in prop::collection::vec(-100.0f32..100.0, 1..64)) {
        let hit = self_match(MetricType::L2, vector);
        prop_assert_eq!(hit.id.as_str(), "target");
        prop_assert!(hit.score.abs() < 1e-4, "score {}", hit.score);
    }

    #[test]
    fn cosine_self_match_scores_one(vector in prop::collection::vec(0.1f32..10.0, 1..64)) {
        let hit = self_match(MetricType::Cosine, vector);
        prop_assert_eq!(hit.id.as_str(), "target");
        prop_assert!((hit.score - 1.0).abs() < 1e-4, "score {}", hit.score);
    }
}

#[test]
fn self_match_wins_among_neighbors() {
    let store = store_with(&CollectionSpec::new("images", 4));
    let writer = UpsertClient::new(memory_connection(&store), "images").unwrap();
    writer.upsert_batch(line_points(10, 4)).unwrap();

    let searcher =
        SearchClient::new(memory_connection(&store), "images", SearchOverrides::default())
            .unwrap();
    let hits = searcher.search(&[6.0, 0.0, 0.0, 0.0], Some(3)).unwrap();
    assert_eq!(hits[0].id.as_str(), "p6");
    assert_eq!(hits[0].score, 0.0);
}
