//! The retrieval stage: embed the run topic and pull the nearest chunks
//! back out of the freshly rebuilt index.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use crate::bucket::{ResearchItem, ResultBucket, SourceReport};
use crate::error::PipelineError;

use super::embeddings::EmbeddingProvider;
use super::store::SqliteIndexStore;

/// A retrieved chunk handed to the synthesizer: text plus flattened
/// metadata including `source` and `collector`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetrievalHit {
    pub text: String,
    pub metadata: Value,
}

/// Embeds queries and searches the index.
pub struct Retriever {
    store: Arc<SqliteIndexStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    top_k: usize,
}

impl Retriever {
    pub fn new(
        store: Arc<SqliteIndexStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        top_k: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            top_k,
        }
    }

    /// Retrieve up to `top_k` chunks for `query`.
    ///
    /// A blank query returns an error bucket without touching the index.
    /// An empty index returns a note bucket and no hits.
    pub async fn retrieve(
        &self,
        query: &str,
    ) -> Result<(ResultBucket, Vec<RetrievalHit>), PipelineError> {
        if query.trim().is_empty() {
            return Ok((
                self.empty_result(ResultBucket::from_error("retrieval query is empty")),
                Vec::new(),
            ));
        }
        let started = Instant::now();

        let vectors = self.embedder.embed_batch(&[query.to_string()]).await?;
        let query_vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::Embedding("no vector for query".into()))?;

        let raw_hits = self.store.search(&query_vector, self.top_k).await?;
        if raw_hits.is_empty() {
            return Ok((
                self.empty_result(ResultBucket::from_note("index is empty, nothing to retrieve")),
                Vec::new(),
            ));
        }

        let hits: Vec<RetrievalHit> = raw_hits
            .into_iter()
            .map(|hit| {
                let mut metadata = match hit.metadata {
                    Value::Object(map) => Value::Object(map),
                    _ => json!({}),
                };
                metadata["source"] = json!(hit.source_name);
                metadata["collector"] = json!(hit.collector_key);
                metadata["distance"] = json!(hit.distance);
                RetrievalHit {
                    text: hit.text,
                    metadata,
                }
            })
            .collect();
        info!(hit_count = hits.len(), "retrieved context for synthesis");

        let bucket = ResultBucket::new()
            .with_source(SourceReport::new(
                "retriever",
                vec![ResearchItem::from_text(format!(
                    "Retrieved {} chunks",
                    hits.len()
                ))],
            ))
            .with_detail("hits", serde_json::to_value(&hits)?)
            .with_detail("hit_count", json!(hits.len()))
            .with_detail("top_k", json!(self.top_k))
            .with_detail("query", json!(query))
            .with_elapsed(started.elapsed());
        Ok((bucket, hits))
    }

    // The hit list, its count, and the requested bound are present even
    // when retrieval returns nothing.
    fn empty_result(&self, bucket: ResultBucket) -> ResultBucket {
        bucket
            .with_detail("hits", json!([]))
            .with_detail("hit_count", json!(0))
            .with_detail("top_k", json!(self.top_k))
    }
}
