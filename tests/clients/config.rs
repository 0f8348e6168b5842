//! Connections and collections built from `annlink.toml` sections

use crate::common::*;
use annlink::{BackendConfig, ClientConfig};

fn memory_client(label: &str) -> ClientConfig {
    let toml = format!(
        r#"
[backend]
kind = "memory"
uri = "memory://{label}"

[collection]
name = "catalog"
dimension = 3
index_type = "HNSW"
metric_type = "COSINE"

[search]
limit = 2
output_fields = ["path"]
"#
    );
    let config: ClientConfig = toml::from_str(&toml).unwrap();
    config.validate().unwrap();
    config
}

#[test]
fn config_builds_collection_and_clients() {
    let config = memory_client("config-suite");
    let conn = config.backend.connect().unwrap();
    conn.create_collection(&config.collection_spec().unwrap()).unwrap();

    let writer = UpsertClient::new(config.backend.connect().unwrap(), "catalog").unwrap();
    writer
        .upsert(Some("x"), vec![1.0, 0.0, 0.0], path_sidecar("x.jpg"))
        .unwrap();
    writer
        .upsert(Some("y"), vec![0.0, 1.0, 0.0], path_sidecar("y.jpg"))
        .unwrap();

    let searcher = SearchClient::new(
        config.backend.connect().unwrap(),
        "catalog",
        config.search.to_overrides().unwrap(),
    )
    .unwrap();
    assert_eq!(searcher.resolved().index.index_type, IndexType::Hnsw);
    assert_eq!(searcher.resolved().index.metric_type, MetricType::Cosine);

    let hits = searcher.search(&[0.9, 0.1, 0.0], None).unwrap();
    assert_eq!(ids(&hits), vec!["x", "y"]);
    assert_eq!(hits[0].field("path").and_then(|v| v.as_str()), Some("x.jpg"));
}

#[test]
fn token_without_uri_rejected() {
    let backend: BackendConfig = toml::from_str("token = \"abc\"\n").unwrap();
    assert_eq!(backend.validate().unwrap_err().kind(), ErrorKind::Config);
}
