//! An explicit limit caps the hit count and L2 hits rise in distance.

use crate::common::*;

#[test]
fn limit_three_over_ten_points_ascending() {
    let store = store_with(&CollectionSpec::new("images", 2));
    let writer = UpsertClient::new(memory_connection(&store), "images").unwrap();
    writer.upsert_batch(line_points(10, 2)).unwrap();

    let searcher =
        SearchClient::new(memory_connection(&store), "images", SearchOverrides::default())
            .unwrap();
    let hits = searcher.search(&[-0.5, 0.0], Some(3)).unwrap();

    assert_eq!(hits.len(), 3);
    assert_eq!(ids(&hits), vec!["p0", "p1", "p2"]);
    assert!(hits.windows(2).all(|w| w[0].score < w[1].score));
}

#[test]
fn default_limit_applies_without_override() {
    let store = store_with(&CollectionSpec::new("images", 2));
    let writer = UpsertClient::new(memory_connection(&store), "images").unwrap();
    writer.upsert_batch(line_points(12, 2)).unwrap();

    let searcher = SearchClient::new(
        memory_connection(&store),
        "images",
        SearchOverrides::default().limit(4),
    )
    .unwrap();
    assert_eq!(searcher.search(&[0.0, 0.0], None).unwrap().len(), 4);
    assert_eq!(searcher.search(&[0.0, 0.0], Some(7)).unwrap().len(), 7);
}
