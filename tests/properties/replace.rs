//! Re-upserting an id replaces the stored record as a whole.

use crate::common::*;

#[test]
fn reupsert_moves_record_away_from_old_vector() {
    let store = store_with(&CollectionSpec::new("images", 3));
    let writer = UpsertClient::new(memory_connection(&store), "images").unwrap();

    let old = vec![1.0, 2.0, 3.0];
    let new = vec![-5.0, 0.5, 9.0];
    writer.upsert(Some("k"), old.clone(), path_sidecar("old.jpg")).unwrap();
    writer.upsert(Some("k"), new.clone(), path_sidecar("new.jpg")).unwrap();
    assert_eq!(writer.count().unwrap(), 1);

    let searcher = SearchClient::new(
        memory_connection(&store),
        "images",
        SearchOverrides::default().output_fields(["path"]),
    )
    .unwrap();

    let near_old = searcher.search(&old, None).unwrap();
    assert!(!near_old
        .iter()
        .any(|h| h.id.as_str() == "k" && h.score.abs() < 1e-4));

    let near_new = searcher.search(&new, Some(1)).unwrap();
    assert_eq!(near_new[0].id.as_str(), "k");
    assert_eq!(near_new[0].score, 0.0);
    assert_eq!(
        near_new[0].field("path").and_then(|v| v.as_str()),
        Some("new.jpg")
    );
}
