//! Background export of date-filtered copies of an append-only log.
//!
//! A submitted export gets a numeric job id right away and runs on a pool of
//! worker tasks. Job states are tracked in memory, while the produced files
//! and the markers of failed exports are the durable record that lets jobs
//! from previous runs be found again after a restart.

mod allocator;
mod error;
mod filter;
mod job;
mod naming;
mod registry;
mod resolver;
mod runner;
mod service;

pub use allocator::JobIdAllocator;
pub use error::ExportError;
pub use filter::{FilterReport, LogFilter};
pub use job::{JobId, JobSnapshot, JobStatus};
pub use naming::{validate_date_token, ArtifactNaming, FAILED_SUFFIX, PARTIAL_SUFFIX};
pub use registry::JobRegistry;
pub use resolver::StatusResolver;
pub use runner::{ExportJobRunner, ExportSettings};
pub use service::{ExportArtifact, LogExportService};
