//! The sequential finalize chain: cleanup, archive, index, retrieve,
//! synthesize.

pub mod archive;
pub mod cleanup;
pub mod synthesize;

pub use archive::{archive, slugify};
pub use cleanup::cleanup;
pub use synthesize::{ReportWriter, TemplateReportWriter, synthesize};
