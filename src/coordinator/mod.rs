//! Pipeline assembly and execution.

pub mod builder;
pub mod runner;
pub mod selection;

pub use builder::PipelineBuilder;
pub use runner::{ResearchPipeline, RunPhase, RunReport, RunRequest};
pub use selection::select_branches;
