//! The run loop: fan out to collectors, join at the barrier, then walk the
//! sequential finalize chain.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use rustc_hash::FxHashMap;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::bucket::{Mode, ResultBucket};
use crate::collector::{BranchKind, CollectRequest, Collector, CollectorContext};
use crate::config::PipelineConfig;
use crate::error::{CoordinatorError, PipelineError};
use crate::events::{Event, EventSink};
use crate::indexing::{Indexer, RetrievalHit, Retriever, default_codec};
use crate::services::PipelineServices;
use crate::stages;
use crate::state::{
    ARCHIVE_KEY, CLEANUP_KEY, FINAL_REPORT_KEY, INDEX_KEY, RETRIEVAL_KEY, RunState,
};

/// What one research run should do.
#[derive(Clone, Debug)]
pub struct RunRequest {
    pub topic: String,
    pub mode: Mode,
    /// Branches to fan out to; empty means every registered branch.
    pub branches: Vec<BranchKind>,
}

impl RunRequest {
    pub fn new(topic: impl Into<String>, mode: Mode) -> Self {
        Self {
            topic: topic.into(),
            mode,
            branches: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_branches(mut self, branches: Vec<BranchKind>) -> Self {
        self.branches = branches;
        self
    }
}

/// Where a run is in its lifecycle.
///
/// There is no failed phase: stage failures are absorbed into error buckets
/// and the run still reaches `Done`, while fatal wiring problems (duplicate
/// state keys) surface as an `Err` from [`ResearchPipeline::run`] instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Pending,
    FannedOut,
    Joined,
    Cleaning,
    Archiving,
    Indexing,
    Retrieving,
    Synthesizing,
    Done,
}

/// Everything a finished run produced.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: String,
    pub topic: String,
    pub mode: Mode,
    pub phase: RunPhase,
    pub state: RunState,
    /// The final report text, when synthesis produced one.
    pub report: Option<String>,
    pub elapsed: Duration,
}

/// A compiled pipeline: collectors keyed by branch plus the finalize-chain
/// services. Build one with [`PipelineBuilder`](super::PipelineBuilder).
pub struct ResearchPipeline {
    registered: Vec<BranchKind>,
    collectors: FxHashMap<BranchKind, Arc<dyn Collector>>,
    config: PipelineConfig,
    services: PipelineServices,
    events: EventSink,
}

impl ResearchPipeline {
    pub(crate) fn new(
        registered: Vec<BranchKind>,
        collectors: FxHashMap<BranchKind, Arc<dyn Collector>>,
        config: PipelineConfig,
        services: PipelineServices,
        events: EventSink,
    ) -> Self {
        Self {
            registered,
            collectors,
            config,
            services,
            events,
        }
    }

    /// Branches with a registered collector, in registration order.
    pub fn registered_branches(&self) -> &[BranchKind] {
        &self.registered
    }

    /// Install an event channel and return its receiver. Replaces any
    /// previously installed channel.
    pub fn event_channel(&mut self) -> flume::Receiver<Event> {
        let (sink, receiver) = crate::events::channel();
        self.events = sink;
        receiver
    }

    /// Execute one research run end to end.
    ///
    /// Branch and stage failures are absorbed into error buckets; the only
    /// fatal errors are broken run-state invariants.
    #[instrument(skip(self, request), fields(topic = %request.topic, mode = %request.mode))]
    pub async fn run(&self, request: RunRequest) -> Result<RunReport, CoordinatorError> {
        let started = Instant::now();
        let run_id = Uuid::new_v4().to_string();
        let mut state = RunState::new();

        let branches = super::selection::select_branches(&request.branches, &self.registered);
        info!(run_id = %run_id, ?branches, "starting research run");

        // Fan out.
        self.advance(RunPhase::FannedOut, "fanning out collectors");
        let mut tasks: JoinSet<(BranchKind, ResultBucket)> = JoinSet::new();
        let mut task_branches: FxHashMap<tokio::task::Id, BranchKind> = FxHashMap::default();
        for branch in branches {
            let Some(collector) = self.collectors.get(&branch).cloned() else {
                continue;
            };
            let collect_request = CollectRequest::new(request.topic.clone(), request.mode);
            let ctx = CollectorContext::new(branch, run_id.clone(), self.events.clone());
            let branch_timeout = self.config.branch_timeout;
            let handle = tasks.spawn(async move {
                let branch_started = Instant::now();
                let bucket =
                    run_collector(collector, branch, collect_request, ctx, branch_timeout).await;
                (branch, bucket.with_elapsed(branch_started.elapsed()))
            });
            task_branches.insert(handle.id(), branch);
        }

        // Barrier join: every launched branch writes exactly one bucket
        // under its own key before any stage runs.
        while let Some(joined) = tasks.join_next_with_id().await {
            let (branch, bucket) = match joined {
                Ok((id, (branch, bucket))) => {
                    task_branches.remove(&id);
                    (branch, bucket)
                }
                Err(join_err) => {
                    let branch = task_branches.remove(&join_err.id());
                    let Some(branch) = branch else {
                        error!(error = %join_err, "join error for unknown branch task");
                        continue;
                    };
                    (branch, ResultBucket::from_error(join_err.to_string()))
                }
            };
            if bucket.has_error() {
                warn!(branch = %branch, error = ?bucket.error_message(), "branch failed");
            }
            let _ = self
                .events
                .emit(Event::branch(branch, format!("joined ({} items)", bucket.item_count())));
            state.put(branch.state_key(), bucket)?;
        }
        self.advance(RunPhase::Joined, "all branches joined");

        // Finalize chain, each stage absorbing its own failures.
        self.advance(RunPhase::Cleaning, "cleanup");
        let cleanup_bucket = stages::cleanup(
            &self.config.archive_dir,
            self.services.store.as_deref(),
        )
        .await;
        state.put(CLEANUP_KEY, cleanup_bucket)?;

        self.advance(RunPhase::Archiving, "archive");
        let archive_bucket = stages::archive(
            &state,
            &request.topic,
            request.mode,
            &run_id,
            &self.config.archive_dir,
        )
        .await
        .unwrap_or_else(absorb);
        state.put(ARCHIVE_KEY, archive_bucket)?;

        self.advance(RunPhase::Indexing, "index");
        let index_bucket = self.index_stage(&state).await;
        state.put(INDEX_KEY, index_bucket)?;

        self.advance(RunPhase::Retrieving, "retrieve");
        let (retrieval_bucket, hits) = self.retrieval_stage(&request.topic).await;
        state.put(RETRIEVAL_KEY, retrieval_bucket)?;

        self.advance(RunPhase::Synthesizing, "synthesize");
        let report_bucket = stages::synthesize(
            self.services.report_writer.as_ref(),
            &request.topic,
            request.mode,
            &hits,
        )
        .await
        .unwrap_or_else(absorb);
        let report = report_bucket
            .sources
            .first()
            .and_then(|s| s.items.first())
            .and_then(|item| item.content.clone());
        state.put(FINAL_REPORT_KEY, report_bucket)?;

        self.advance(RunPhase::Done, "run complete");
        info!(run_id = %run_id, elapsed = ?started.elapsed(), "research run finished");

        Ok(RunReport {
            run_id,
            topic: request.topic,
            mode: request.mode,
            phase: RunPhase::Done,
            state,
            report,
            elapsed: started.elapsed(),
        })
    }

    async fn index_stage(&self, state: &RunState) -> ResultBucket {
        let Some((store, embedder)) = self.services.index_backend() else {
            return absorb(PipelineError::IndexUnavailable(
                "no index store or embedder configured".into(),
            ));
        };
        let indexer = match Indexer::new(
            store,
            embedder,
            default_codec(),
            self.config.window_tokens,
            self.config.overlap_tokens,
        ) {
            Ok(indexer) => indexer,
            Err(err) => return ResultBucket::from_error(err.to_string()),
        };
        indexer.index(state).await.unwrap_or_else(absorb)
    }

    async fn retrieval_stage(&self, topic: &str) -> (ResultBucket, Vec<RetrievalHit>) {
        let Some((store, embedder)) = self.services.index_backend() else {
            return (
                absorb(PipelineError::IndexUnavailable(
                    "no index store or embedder configured".into(),
                )),
                Vec::new(),
            );
        };
        let retriever = Retriever::new(store, embedder, self.config.top_k);
        match retriever.retrieve(topic).await {
            Ok(outcome) => outcome,
            Err(err) => (absorb(err), Vec::new()),
        }
    }

    fn advance(&self, to: RunPhase, message: &str) {
        let _ = self
            .events
            .emit(Event::stage(format!("{to:?}").to_lowercase(), message));
    }
}

/// Convert an absorbed stage error into its bucket form.
fn absorb(err: PipelineError) -> ResultBucket {
    ResultBucket::from_error(err.to_string())
}

/// Run one collector to a bucket, absorbing errors, panics, and timeouts.
async fn run_collector(
    collector: Arc<dyn Collector>,
    branch: BranchKind,
    request: CollectRequest,
    ctx: CollectorContext,
    branch_timeout: Option<Duration>,
) -> ResultBucket {
    let fut = AssertUnwindSafe(collector.collect(&request, ctx)).catch_unwind();
    let caught = match branch_timeout {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(caught) => caught,
            Err(_) => {
                return absorb(PipelineError::BranchTimeout {
                    seconds: limit.as_secs(),
                });
            }
        },
        None => fut.await,
    };
    match caught {
        Ok(Ok(bucket)) => bucket,
        Ok(Err(err)) => absorb(PipelineError::Collector(err.to_string())),
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "opaque panic payload".to_string());
            error!(branch = %branch, panic = %message, "collector panicked");
            absorb(PipelineError::Collector(format!(
                "collector panicked: {message}"
            )))
        }
    }
}
