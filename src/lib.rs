//! Log Export Engine Library
//!
//! This library exposes the export engine and its configuration for the
//! console binary and for integration tests.

pub mod cli_style;
pub mod config;
pub mod log_export;

// Re-export commonly used types for convenience
pub use config::{AppConfig, CliConfig, FileConfig};
pub use log_export::{
    ExportArtifact, ExportError, ExportSettings, JobId, JobStatus, LogExportService,
};
