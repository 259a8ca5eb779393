//! Error taxonomy for the pipeline.
//!
//! Two tiers, matching how failures are handled:
//! [`CoordinatorError`] is fatal and aborts the run (state key conflicts,
//! misassembled pipelines), while [`PipelineError`] is absorbed at the stage
//! or branch boundary into an error bucket so the run keeps its shape.

use miette::Diagnostic;
use thiserror::Error;

/// Fatal coordinator failures. These indicate a bug in wiring or a broken
/// state invariant, not a flaky dependency, so the run aborts.
#[derive(Debug, Error, Diagnostic)]
pub enum CoordinatorError {
    #[error("run state already contains key '{key}'")]
    #[diagnostic(
        code(gatherweave::state::duplicate_key),
        help("each branch and stage must write to a distinct run-state key")
    )]
    DuplicateStateKey { key: String },

    #[error("run state has no bucket under key '{key}'")]
    #[diagnostic(code(gatherweave::state::missing_key))]
    MissingStateKey { key: String },

    #[error("pipeline has no collectors registered")]
    #[diagnostic(
        code(gatherweave::build::empty),
        help("register at least one collector before compiling")
    )]
    NoCollectors,

    #[error("collector registered twice for branch '{branch}'")]
    #[diagnostic(code(gatherweave::build::duplicate_branch))]
    DuplicateBranch { branch: String },
}

/// Stage- and branch-level failures. Callers convert these into error
/// buckets rather than propagating them past the stage boundary.
#[derive(Debug, Error, Diagnostic)]
pub enum PipelineError {
    #[error("collector failed: {0}")]
    #[diagnostic(code(gatherweave::collect::failed))]
    Collector(String),

    #[error("branch timed out after {seconds}s")]
    #[diagnostic(code(gatherweave::collect::timeout))]
    BranchTimeout { seconds: u64 },

    #[error("embedding provider error: {0}")]
    #[diagnostic(code(gatherweave::embed::provider))]
    Embedding(String),

    #[error("index store unavailable: {0}")]
    #[diagnostic(
        code(gatherweave::index::unavailable),
        help("construct the pipeline with an index store and embedder to enable indexing")
    )]
    IndexUnavailable(String),

    #[error("index store error: {0}")]
    #[diagnostic(code(gatherweave::index::store))]
    Store(#[from] tokio_rusqlite::Error),

    #[error("chunking failed: {0}")]
    #[diagnostic(code(gatherweave::chunk::failed))]
    Chunk(#[from] ChunkError),

    #[error("archive write failed: {0}")]
    #[diagnostic(code(gatherweave::archive::io))]
    ArchiveIo(#[from] std::io::Error),

    #[error("serialization failed: {0}")]
    #[diagnostic(code(gatherweave::serde::json))]
    Json(#[from] serde_json::Error),

    #[error("report writer error: {0}")]
    #[diagnostic(code(gatherweave::synthesize::writer))]
    ReportWriter(String),
}

/// Failures inside the token chunker.
#[derive(Debug, Error, Diagnostic)]
pub enum ChunkError {
    #[error("chunk overlap {overlap} must be smaller than window {window}")]
    #[diagnostic(
        code(gatherweave::chunk::bad_overlap),
        help("pick an overlap strictly below the window so every step advances")
    )]
    OverlapTooLarge { window: usize, overlap: usize },

    #[error("chunk window must be non-zero")]
    #[diagnostic(code(gatherweave::chunk::zero_window))]
    ZeroWindow,

    #[error("token decode failed: {0}")]
    #[diagnostic(code(gatherweave::chunk::decode))]
    TokenDecode(String),
}

/// Failures raised by embedding providers.
#[derive(Debug, Error, Diagnostic)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    #[diagnostic(code(gatherweave::embed::request))]
    Request(String),

    #[error("embedding response malformed: {0}")]
    #[diagnostic(code(gatherweave::embed::response))]
    Response(String),

    #[error("embedding provider returned {got} vectors for {expected} inputs")]
    #[diagnostic(code(gatherweave::embed::arity))]
    Arity { expected: usize, got: usize },
}

impl From<EmbeddingError> for PipelineError {
    fn from(err: EmbeddingError) -> Self {
        PipelineError::Embedding(err.to_string())
    }
}
