//! One search client shared across threads

use crate::common::*;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn concurrent_searches_agree() {
    let store = store_with(&CollectionSpec::new("images", 2));
    let writer = UpsertClient::new(memory_connection(&store), "images").unwrap();
    writer.upsert_batch(line_points(10, 2)).unwrap();

    let searcher = Arc::new(
        SearchClient::new(memory_connection(&store), "images", SearchOverrides::default()).unwrap(),
    );

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let searcher = Arc::clone(&searcher);
            thread::spawn(move || {
                let x = (i % 10) as f32;
                let hits = searcher.search(&[x, 0.0], Some(1)).unwrap();
                (format!("p{}", i % 10), hits)
            })
        })
        .collect();

    for handle in handles {
        let (expected, hits) = handle.join().unwrap();
        assert_eq!(hits[0].id.as_str(), expected);
    }
}

#[test]
fn concurrent_first_queries_load_once() {
    let store = MemoryStore::with_explicit_load();
    memory_connection(&store)
        .create_collection(&CollectionSpec::new("images", 2))
        .unwrap();

    let (backend, probe) = ScriptedBackend::new(store);
    let searcher = Arc::new(
        SearchClient::new(backend.connect(), "images", SearchOverrides::default()).unwrap(),
    );

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let searcher = Arc::clone(&searcher);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                searcher.search(&[0.0, 0.0], None).unwrap()
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap().is_empty());
    }

    assert_eq!(probe.loads(), 1);
    assert_eq!(probe.searches(), threads);
}

#[test]
fn each_search_is_one_remote_query() {
    let store = store_with(&CollectionSpec::new("images", 2));
    let (backend, probe) = ScriptedBackend::new(store);
    let searcher =
        SearchClient::new(backend.connect(), "images", SearchOverrides::default()).unwrap();

    searcher
        .search_batch(&[vec![0.0, 0.0], vec![1.0, 1.0], vec![2.0, 2.0]], Some(2))
        .unwrap();
    assert_eq!(probe.searches(), 3);
    assert_eq!(probe.loads(), 0);
}
