//! Fluent assembly of a [`ResearchPipeline`].

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::collector::{BranchKind, Collector};
use crate::config::PipelineConfig;
use crate::error::CoordinatorError;
use crate::events::EventSink;
use crate::indexing::{EmbeddingProvider, SqliteIndexStore};
use crate::services::PipelineServices;
use crate::stages::ReportWriter;

use super::runner::ResearchPipeline;

/// Builder for [`ResearchPipeline`].
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use gatherweave::coordinator::PipelineBuilder;
/// # use gatherweave::indexing::MockEmbeddingProvider;
/// # fn collectors() -> Vec<Arc<dyn gatherweave::collector::Collector>> { vec![] }
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut builder = PipelineBuilder::new()
///     .with_embedder(Arc::new(MockEmbeddingProvider::default()));
/// for collector in collectors() {
///     builder = builder.add_collector(collector);
/// }
/// let pipeline = builder.compile()?;
/// # Ok(()) }
/// ```
#[derive(Default)]
pub struct PipelineBuilder {
    collectors: Vec<Arc<dyn Collector>>,
    config: PipelineConfig,
    services: PipelineServices,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            collectors: Vec::new(),
            config: PipelineConfig::default(),
            services: PipelineServices::default(),
        }
    }

    /// Register a collector for its branch.
    #[must_use]
    pub fn add_collector(mut self, collector: Arc<dyn Collector>) -> Self {
        self.collectors.push(collector);
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_store(mut self, store: Arc<SqliteIndexStore>) -> Self {
        self.services.store = Some(store);
        self
    }

    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.services.embedder = Some(embedder);
        self
    }

    #[must_use]
    pub fn with_report_writer(mut self, writer: Arc<dyn ReportWriter>) -> Self {
        self.services.report_writer = writer;
        self
    }

    /// Validate the assembly and produce a runnable pipeline.
    ///
    /// Fails when no collectors are registered or two collectors claim the
    /// same branch.
    pub fn compile(self) -> Result<ResearchPipeline, CoordinatorError> {
        if self.collectors.is_empty() {
            return Err(CoordinatorError::NoCollectors);
        }
        let mut registered: Vec<BranchKind> = Vec::with_capacity(self.collectors.len());
        let mut by_branch: FxHashMap<BranchKind, Arc<dyn Collector>> = FxHashMap::default();
        for collector in self.collectors {
            let branch = collector.branch();
            if by_branch.insert(branch, collector).is_some() {
                return Err(CoordinatorError::DuplicateBranch {
                    branch: branch.label().to_string(),
                });
            }
            registered.push(branch);
        }
        Ok(ResearchPipeline::new(
            registered,
            by_branch,
            self.config,
            self.services,
            EventSink::disabled(),
        ))
    }
}
