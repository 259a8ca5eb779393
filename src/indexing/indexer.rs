//! The indexing stage: walk the finished run state, chunk every item's
//! text, embed, and replace the vector index in one shot.

use std::sync::Arc;
use std::time::Instant;

use rustc_hash::FxHashSet;
use serde_json::json;
use tracing::{debug, info};

use crate::bucket::{ResearchItem, ResultBucket, SourceReport};
use crate::collector::BranchKind;
use crate::error::{ChunkError, PipelineError};
use crate::state::{FINAL_REPORT_KEY, RunState};

use super::chunker::{TokenChunker, TokenCodec};
use super::embeddings::EmbeddingProvider;
use super::ids::chunk_id;
use super::store::{ChunkRecord, SqliteIndexStore};

/// Chunks, embeds, and writes one run's worth of research into the store.
pub struct Indexer {
    store: Arc<SqliteIndexStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    chunker: TokenChunker<Box<dyn TokenCodec>>,
}

impl Indexer {
    pub fn new(
        store: Arc<SqliteIndexStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        codec: Box<dyn TokenCodec>,
        window_tokens: usize,
        overlap_tokens: usize,
    ) -> Result<Self, ChunkError> {
        let chunker = TokenChunker::new(codec, window_tokens, overlap_tokens)?;
        Ok(Self {
            store,
            embedder,
            chunker,
        })
    }

    /// Index every branch bucket plus the final report.
    ///
    /// Duplicate chunk ids keep their first occurrence. The store's prior
    /// contents are replaced wholesale; when the run produced no indexable
    /// text the store is left untouched and a note bucket is returned.
    pub async fn index(&self, state: &RunState) -> Result<ResultBucket, PipelineError> {
        let started = Instant::now();
        let mut records: Vec<ChunkRecord> = Vec::new();
        let mut seen: FxHashSet<String> = FxHashSet::default();
        let mut duplicates = 0usize;

        for branch in BranchKind::ALL {
            if let Some(bucket) = state.get(branch.state_key()) {
                self.collect_records(branch.label(), bucket, &mut records, &mut seen, &mut duplicates)?;
            }
        }
        if let Some(report) = state.get(FINAL_REPORT_KEY) {
            self.collect_records(FINAL_REPORT_KEY, report, &mut records, &mut seen, &mut duplicates)?;
        }

        if records.is_empty() {
            debug!("no indexable text in run state, leaving index untouched");
            return Ok(ResultBucket::from_note("no data available for indexing"));
        }

        let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        if vectors.len() != records.len() {
            return Err(PipelineError::Embedding(format!(
                "embedder returned {} vectors for {} chunks",
                vectors.len(),
                records.len()
            )));
        }
        for (record, vector) in records.iter_mut().zip(vectors) {
            record.embedding = vector;
        }

        let chunk_count = self.store.replace_all(records).await?;
        info!(chunk_count, duplicates, "rebuilt vector index");

        Ok(ResultBucket::new()
            .with_source(SourceReport::new(
                "indexer",
                vec![ResearchItem::from_text(format!(
                    "Indexed {chunk_count} chunks"
                ))],
            ))
            .with_detail("chunk_count", json!(chunk_count))
            .with_detail("duplicates_skipped", json!(duplicates))
            .with_elapsed(started.elapsed()))
    }

    fn collect_records(
        &self,
        collector_key: &str,
        bucket: &ResultBucket,
        records: &mut Vec<ChunkRecord>,
        seen: &mut FxHashSet<String>,
        duplicates: &mut usize,
    ) -> Result<(), PipelineError> {
        for source in &bucket.sources {
            for (item_index, item) in source.items.iter().enumerate() {
                let Some(text) = item.index_text() else {
                    continue;
                };
                for (chunk_index, chunk) in self.chunker.chunk(&text)?.into_iter().enumerate() {
                    if chunk.trim().is_empty() {
                        continue;
                    }
                    let id = chunk_id(collector_key, &source.name, item_index, chunk_index, &chunk);
                    if !seen.insert(id.clone()) {
                        *duplicates += 1;
                        continue;
                    }
                    let mut metadata = json!({
                        "item_index": item_index,
                        "chunk_index": chunk_index,
                    });
                    if let Some(title) = &item.title {
                        metadata["title"] = json!(title);
                    }
                    if let Some(url) = &item.source {
                        metadata["url"] = json!(url);
                    }
                    records.push(ChunkRecord {
                        id,
                        text: chunk,
                        source_name: source.name.clone(),
                        collector_key: collector_key.to_string(),
                        chunk_index,
                        metadata,
                        embedding: Vec::new(),
                    });
                }
            }
        }
        Ok(())
    }
}
