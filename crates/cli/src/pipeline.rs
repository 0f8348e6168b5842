//! Ingestion and query pipelines
//!
//! Both walk an `ImageSource`, embed each image and hand the vector to the
//! bound client. Both are tolerant per item: an image that cannot be
//! embedded, or that the store rejects with an insert or search error, is
//! logged and skipped. Anything else (source errors, lost connections)
//! stops the run. Skipped queries stay in the results with their reason.

use crate::embed::Embedder;
use annlink_client::{SearchClient, UpsertClient};
use annlink_core::{path_sidecar, AnnError, ErrorKind, SearchHit};
use annlink_source::{ImageSource, SourceError};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal CLI errors
#[derive(Debug, Error)]
pub enum CliError {
    /// Store or configuration failure
    #[error(transparent)]
    Ann(#[from] AnnError),
    /// Source enumeration failure
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Outcome of an ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Images read from the source
    pub submitted: usize,
    /// Records the store confirmed
    pub inserted: usize,
    /// Images skipped after an embed or insert failure
    pub skipped: usize,
    /// Collection entity count after the run
    pub total: u64,
}

/// Results for one query image
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    /// Query image
    pub query: PathBuf,
    /// Hits in store order
    pub matches: Vec<Match>,
    /// Why the query was skipped; `None` when it was answered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

impl QueryResult {
    fn answered(query: PathBuf, hits: &[SearchHit]) -> Self {
        QueryResult {
            query,
            matches: hits.iter().map(Match::from_hit).collect(),
            skipped: None,
        }
    }

    fn skipped(query: PathBuf, reason: String) -> Self {
        QueryResult {
            query,
            matches: Vec::new(),
            skipped: Some(reason),
        }
    }
}

/// One hit with its stored path resolved
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Match {
    /// Record id
    pub id: String,
    /// Store-native score
    pub score: f32,
    /// Absolute path of the matched image, if stored
    pub path: Option<PathBuf>,
}

impl Match {
    fn from_hit(hit: &SearchHit) -> Self {
        Match {
            id: hit.id.as_str().to_string(),
            score: hit.score,
            path: hit.resolved_path("path"),
        }
    }
}

/// Embed and upsert every image in `source`
pub fn ingest(
    source: &ImageSource,
    embedder: &dyn Embedder,
    writer: &UpsertClient,
) -> Result<IngestReport, CliError> {
    let mut report = IngestReport::default();

    tracing::info!(
        target: "annlink::ingest",
        %source,
        collection = writer.collection(),
        model = embedder.model(),
        "Ingesting"
    );

    for path in source.paths()? {
        let path = path?;
        report.submitted += 1;

        let vector = match embedder.embed(&path) {
            Ok(vector) => vector,
            Err(e) => {
                tracing::warn!(
                    target: "annlink::ingest",
                    path = %path.display(),
                    error = %e,
                    "Skipping image: embedding failed"
                );
                report.skipped += 1;
                continue;
            }
        };

        match writer.upsert(None, vector, path_sidecar(&path)) {
            Ok(n) => report.inserted += n,
            Err(e) if e.kind() == ErrorKind::Insert => {
                tracing::warn!(
                    target: "annlink::ingest",
                    path = %path.display(),
                    error = %e,
                    "Skipping image: insert failed"
                );
                report.skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    report.total = writer.count()?;
    tracing::info!(
        target: "annlink::ingest",
        collection = writer.collection(),
        submitted = report.submitted,
        inserted = report.inserted,
        skipped = report.skipped,
        total = report.total,
        "Ingest complete"
    );
    Ok(report)
}

/// Embed every image in `source` and look up its neighbors
pub fn search(
    source: &ImageSource,
    embedder: &dyn Embedder,
    searcher: &SearchClient,
    limit: Option<usize>,
) -> Result<Vec<QueryResult>, CliError> {
    let mut results = Vec::new();
    for path in source.paths()? {
        let path = path?;

        let vector = match embedder.embed(&path) {
            Ok(vector) => vector,
            Err(e) => {
                tracing::warn!(
                    target: "annlink::search",
                    query = %path.display(),
                    error = %e,
                    "Skipping query: embedding failed"
                );
                results.push(QueryResult::skipped(path, e.to_string()));
                continue;
            }
        };

        match searcher.search(&vector, limit) {
            Ok(hits) => {
                tracing::debug!(
                    target: "annlink::search",
                    query = %path.display(),
                    hits = hits.len(),
                    "Query answered"
                );
                results.push(QueryResult::answered(path, &hits));
            }
            Err(e) if e.kind() == ErrorKind::Search => {
                tracing::warn!(
                    target: "annlink::search",
                    query = %path.display(),
                    error = %e,
                    "Skipping query: search failed"
                );
                results.push(QueryResult::skipped(path, e.to_string()));
            }
            Err(e) => return Err(e.into()),
        }
    }

    let skipped = results.iter().filter(|r| r.skipped.is_some()).count();
    if skipped > 0 {
        tracing::warn!(
            target: "annlink::search",
            queries = results.len(),
            skipped,
            "Some queries were skipped"
        );
    }
    Ok(results)
}
