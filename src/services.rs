//! Shared service handles injected into the pipeline at build time.

use std::sync::Arc;

use crate::indexing::{EmbeddingProvider, SqliteIndexStore};
use crate::stages::{ReportWriter, TemplateReportWriter};

/// The injectable dependencies of a pipeline instance.
///
/// Store and embedder are optional: when either is absent the indexing and
/// retrieval stages report a structured "unavailable" error bucket instead
/// of failing the run.
#[derive(Clone)]
pub struct PipelineServices {
    pub store: Option<Arc<SqliteIndexStore>>,
    pub embedder: Option<Arc<dyn EmbeddingProvider>>,
    pub report_writer: Arc<dyn ReportWriter>,
}

impl PipelineServices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Both vector-index dependencies, if present.
    pub fn index_backend(&self) -> Option<(Arc<SqliteIndexStore>, Arc<dyn EmbeddingProvider>)> {
        Some((self.store.clone()?, self.embedder.clone()?))
    }
}

impl Default for PipelineServices {
    fn default() -> Self {
        Self {
            store: None,
            embedder: None,
            report_writer: Arc::new(TemplateReportWriter),
        }
    }
}
