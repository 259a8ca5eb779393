//! The collector seam: branch identities and the trait each branch
//! implements.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::bucket::{Mode, ResultBucket};
use crate::error::PipelineError;
use crate::events::EventSink;

/// The fixed set of research branches a run can fan out to.
///
/// Each branch owns a distinct run-state key; the coordinator only launches
/// branches that have a registered collector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchKind {
    Web,
    Academic,
    News,
    Social,
    Financial,
    Video,
    Answers,
}

impl BranchKind {
    pub const ALL: [BranchKind; 7] = [
        BranchKind::Web,
        BranchKind::Academic,
        BranchKind::News,
        BranchKind::Social,
        BranchKind::Financial,
        BranchKind::Video,
        BranchKind::Answers,
    ];

    /// The run-state key this branch writes its bucket under.
    #[must_use]
    pub fn state_key(&self) -> &'static str {
        match self {
            BranchKind::Web => "web_results",
            BranchKind::Academic => "academic_results",
            BranchKind::News => "news_results",
            BranchKind::Social => "social_results",
            BranchKind::Financial => "financial_results",
            BranchKind::Video => "video_results",
            BranchKind::Answers => "answer_results",
        }
    }

    /// Collector-key label recorded in chunk metadata at indexing time.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            BranchKind::Web => "web",
            BranchKind::Academic => "academic",
            BranchKind::News => "news",
            BranchKind::Social => "social",
            BranchKind::Financial => "financial",
            BranchKind::Video => "video",
            BranchKind::Answers => "answers",
        }
    }

    /// Parse a user-supplied branch name, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "web" => Some(BranchKind::Web),
            "academic" => Some(BranchKind::Academic),
            "news" => Some(BranchKind::News),
            "social" => Some(BranchKind::Social),
            "financial" => Some(BranchKind::Financial),
            "video" => Some(BranchKind::Video),
            "answers" => Some(BranchKind::Answers),
            _ => None,
        }
    }
}

impl std::fmt::Display for BranchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// What a collector is asked to research.
#[derive(Clone, Debug)]
pub struct CollectRequest {
    pub topic: String,
    pub mode: Mode,
    /// Per-source item cap derived from the mode.
    pub item_cap: usize,
}

impl CollectRequest {
    pub fn new(topic: impl Into<String>, mode: Mode) -> Self {
        Self {
            topic: topic.into(),
            mode,
            item_cap: mode.item_cap(),
        }
    }
}

/// Context handed to a collector for the duration of one branch execution.
#[derive(Clone, Debug)]
pub struct CollectorContext {
    pub branch: BranchKind,
    pub run_id: String,
    events: EventSink,
}

impl CollectorContext {
    pub fn new(branch: BranchKind, run_id: String, events: EventSink) -> Self {
        Self {
            branch,
            run_id,
            events,
        }
    }

    /// Emit a diagnostic event attributed to this branch.
    pub fn emit(&self, message: impl Into<String>) -> Result<(), flume::SendError<crate::events::Event>> {
        self.events
            .emit(crate::events::Event::branch(self.branch, message))
    }
}

/// One research branch. Implementations gather items from their providers,
/// normalize them into a [`ResultBucket`], and never let provider failures
/// escape as anything other than `Err` (which the runner absorbs into an
/// error bucket, preserving the branch's state key).
#[async_trait]
pub trait Collector: Send + Sync {
    /// The branch this collector serves.
    fn branch(&self) -> BranchKind;

    async fn collect(
        &self,
        request: &CollectRequest,
        ctx: CollectorContext,
    ) -> Result<ResultBucket, PipelineError>;
}
