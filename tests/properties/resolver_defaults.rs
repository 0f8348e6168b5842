//! Query configuration follows the collection's first index.

use crate::common::*;
use annlink::resolve;

#[test]
fn no_index_selects_ivf_flat_defaults() {
    let mut descriptor = CollectionSpec::new("images", 8).to_descriptor();
    descriptor.indexes.clear();

    let resolved = resolve(&descriptor, &SearchOverrides::default()).unwrap();
    assert_eq!(resolved.index.index_type, IndexType::IvfFlat);
    assert_eq!(resolved.index.search_params.get("nprobe"), Some(&10));
    assert_eq!(resolved.index.metric_type, MetricType::L2);
    assert_eq!(resolved.limit, 10);
}

#[test]
fn hnsw_index_selects_ef_without_nprobe() {
    let descriptor = CollectionSpec::new("images", 8)
        .with_index(IndexSpec::hnsw(MetricType::Ip, 16, 200))
        .to_descriptor();

    let resolved = resolve(&descriptor, &SearchOverrides::default()).unwrap();
    assert_eq!(resolved.index.index_type, IndexType::Hnsw);
    assert_eq!(resolved.index.search_params.get("ef"), Some(&10));
    assert!(!resolved.index.search_params.contains_key("nprobe"));
    assert_eq!(resolved.index.metric_type, MetricType::Ip);
}

#[test]
fn search_client_resolves_once_from_store_metadata() {
    let spec = CollectionSpec::new("images", 8).with_index(IndexSpec::hnsw(MetricType::L2, 8, 64));
    let store = store_with(&spec);
    let searcher =
        SearchClient::new(memory_connection(&store), "images", SearchOverrides::default())
            .unwrap();
    assert_eq!(searcher.resolved().index.index_type, IndexType::Hnsw);
    assert_eq!(searcher.resolved().anns_field, "embedding");
}
