//! # Gatherweave: Fan-out Research Collection with a Per-run Semantic Index
//!
//! Gatherweave coordinates parallel research collectors, joins their results
//! at a barrier, and runs a sequential finalize chain that cleans, archives,
//! indexes, retrieves, and synthesizes a final report.
//!
//! ## Core Concepts
//!
//! - **Collectors**: Async units of work, one per research branch, that
//!   normalize provider output into result buckets
//! - **Run State**: A write-once key/bucket map each branch and stage writes
//!   exactly one entry into
//! - **Buckets**: The uniform result shape (sources, items, accounting,
//!   details) shared by branches and stages alike
//! - **Finalize chain**: cleanup, archive, index, retrieve, synthesize, in
//!   that order, each absorbing its own failures
//! - **Index**: A SQLite vector store rebuilt wholesale on every run from
//!   token-bounded, content-addressed chunks
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use gatherweave::bucket::{Mode, ResearchItem, ResultBucket, SourceReport};
//! use gatherweave::collector::{BranchKind, CollectRequest, Collector, CollectorContext};
//! use gatherweave::coordinator::{PipelineBuilder, RunRequest};
//! use gatherweave::error::PipelineError;
//! use gatherweave::indexing::{MockEmbeddingProvider, SqliteIndexStore};
//!
//! struct WebCollector;
//!
//! #[async_trait]
//! impl Collector for WebCollector {
//!     fn branch(&self) -> BranchKind {
//!         BranchKind::Web
//!     }
//!
//!     async fn collect(
//!         &self,
//!         request: &CollectRequest,
//!         _ctx: CollectorContext,
//!     ) -> Result<ResultBucket, PipelineError> {
//!         let items = vec![ResearchItem::from_text(format!(
//!             "findings about {}",
//!             request.topic
//!         ))];
//!         Ok(ResultBucket::new().with_source(SourceReport::new("tavily", items)))
//!     }
//! }
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(SqliteIndexStore::open("index.db").await?);
//! let pipeline = PipelineBuilder::new()
//!     .add_collector(Arc::new(WebCollector))
//!     .with_store(store)
//!     .with_embedder(Arc::new(MockEmbeddingProvider::default()))
//!     .compile()?;
//!
//! let report = pipeline
//!     .run(RunRequest::new("quantum computing", Mode::Simple))
//!     .await?;
//! println!("{}", report.report.unwrap_or_default());
//! # Ok(()) }
//! ```
//!
//! ## Failure Model
//!
//! Collector errors, panics, and timeouts never abort a run: each becomes
//! an error bucket under the branch's own state key, so downstream stages
//! always see the full set of launched branches. The only fatal errors are
//! broken wiring invariants, surfaced as
//! [`CoordinatorError`](error::CoordinatorError).

pub mod bucket;
pub mod collector;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod indexing;
pub mod services;
pub mod stages;
pub mod state;

pub use bucket::{Mode, ResearchItem, ResultBucket, SourceReport};
pub use collector::{BranchKind, CollectRequest, Collector, CollectorContext};
pub use config::PipelineConfig;
pub use coordinator::{PipelineBuilder, ResearchPipeline, RunPhase, RunReport, RunRequest};
pub use error::{CoordinatorError, PipelineError};
pub use events::{Event, EventSink};
pub use services::PipelineServices;
pub use state::RunState;
