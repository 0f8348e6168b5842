//! Connection handle lifecycle

use crate::common::*;
use annlink::{ConnectOptions, Credentials, Target};
use std::time::Duration;

#[test]
fn handles_have_distinct_ids() {
    let store = MemoryStore::new();
    let a = memory_connection(&store);
    let b = memory_connection(&store);
    assert_ne!(a.id(), b.id());
}

#[test]
fn disconnect_is_idempotent_and_closes_handle() {
    let store = store_with(&CollectionSpec::new("images", 2));
    let conn = memory_connection(&store);
    assert!(conn.has_collection("images").unwrap());

    conn.disconnect().unwrap();
    conn.disconnect().unwrap();
    assert!(conn.is_closed());
    assert_eq!(conn.has_collection("images").unwrap_err().kind(), ErrorKind::Connection);
}

#[test]
fn closed_handle_fails_clients() {
    let store = store_with(&CollectionSpec::new("images", 2));
    let conn = memory_connection(&store);
    let searcher = SearchClient::new(conn, "images", SearchOverrides::default()).unwrap();
    searcher.connection().disconnect().unwrap();
    let err = searcher.search(&[0.0, 0.0], None).unwrap_err();
    assert!(err.is_connection());
}

#[test]
fn memory_targets_share_data_by_label() {
    let open = || {
        Connection::open(
            Target::uri("memory://lifecycle-shared"),
            Credentials::None,
            ConnectOptions::new(BackendKind::Memory),
        )
        .unwrap()
    };
    open().create_collection(&CollectionSpec::new("shared", 2)).unwrap();
    assert!(open().has_collection("shared").unwrap());
    open().drop_collection("shared").unwrap();
}

#[test]
fn unreachable_store_is_connection_error() {
    let err = Connection::open(
        Target::host_port("127.0.0.1", 9),
        Credentials::None,
        ConnectOptions::new(BackendKind::Milvus).with_timeout(Duration::from_millis(500)),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
}

#[test]
fn token_requires_uri_target() {
    let err = Connection::open(
        Target::host_port("localhost", 19530),
        Credentials::token("root:Milvus"),
        ConnectOptions::new(BackendKind::Milvus),
    )
    .unwrap_err();
    assert!(err.is_connection());
}

#[test]
fn recreate_empties_collection() {
    let spec = CollectionSpec::new("images", 2);
    let store = store_with(&spec);
    let writer = UpsertClient::new(memory_connection(&store), "images").unwrap();
    writer.upsert_batch(line_points(3, 2)).unwrap();

    let conn = memory_connection(&store);
    conn.recreate_collection(&spec).unwrap();
    assert_eq!(conn.count("images").unwrap(), 0);
}
