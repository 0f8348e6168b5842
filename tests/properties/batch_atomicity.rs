//! A store that confirms fewer records than submitted is an insert error.

use crate::common::*;

#[test]
fn short_acceptance_is_partial_insert() {
    let store = store_with(&CollectionSpec::new("images", 4));
    let (backend, probe) = ScriptedBackend::new(store.clone());
    let writer = UpsertClient::new(backend.short_by(1).connect(), "images").unwrap();

    let err = writer.upsert_batch(line_points(5, 4)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Insert);
    assert!(err.is_insert());
    match err {
        AnnError::PartialInsert {
            submitted,
            accepted,
            ..
        } => {
            assert_eq!(submitted, 5);
            assert_eq!(accepted, 4);
        }
        other => panic!("expected PartialInsert, got {other:?}"),
    }
    assert_eq!(probe.upserts(), 1);

    // No rollback: what the store accepted stays
    assert_eq!(memory_connection(&store).count("images").unwrap(), 4);
}

#[test]
fn full_acceptance_returns_count() {
    let store = store_with(&CollectionSpec::new("images", 4));
    let (backend, probe) = ScriptedBackend::new(store);
    let writer = UpsertClient::new(backend.connect(), "images").unwrap();

    assert_eq!(writer.upsert_batch(line_points(5, 4)).unwrap(), 5);
    assert_eq!(probe.upserts(), 1);
}

#[test]
fn invalid_record_rejects_whole_batch_before_sending() {
    let store = store_with(&CollectionSpec::new("images", 4));
    let (backend, probe) = ScriptedBackend::new(store.clone());
    let writer = UpsertClient::new(backend.connect(), "images").unwrap();

    let mut batch = line_points(3, 4);
    batch.push(NewRecord::keyed("bad", vec![1.0, 2.0], path_sidecar("bad.jpg")));
    assert!(writer.upsert_batch(batch).is_err());
    assert_eq!(probe.upserts(), 0);
    assert_eq!(memory_connection(&store).count("images").unwrap(), 0);
}
