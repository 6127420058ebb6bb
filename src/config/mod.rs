mod file_config;

pub use file_config::{ExportsConfig, FileConfig};

use crate::log_export::{ArtifactNaming, ExportSettings};
use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub logs_dir: PathBuf,
    pub source_log: String,
    pub artifact_prefix: Option<String>,
    pub artifact_extension: String,
    pub max_concurrent_exports: usize,
    pub export_delay_ms: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            logs_dir: PathBuf::from("logs"),
            source_log: "app.log".to_string(),
            artifact_prefix: None,
            artifact_extension: "log".to_string(),
            max_concurrent_exports: 4,
            export_delay_ms: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub logs_dir: PathBuf,
    pub source_log: String,
    pub naming: ArtifactNaming,
    pub max_concurrent_exports: usize,
    pub export_delay: Duration,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let logs_dir = file
            .logs_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| cli.logs_dir.clone());

        if !logs_dir.exists() {
            bail!("Logs directory does not exist: {:?}", logs_dir);
        }
        if !logs_dir.is_dir() {
            bail!("logs_dir is not a directory: {:?}", logs_dir);
        }

        let source_log = file.source_log.unwrap_or_else(|| cli.source_log.clone());
        validate_file_component("source_log", &source_log)?;

        let exports = file.exports.unwrap_or_default();

        // Artifacts are named after the source log unless told otherwise
        let artifact_prefix = exports
            .artifact_prefix
            .or_else(|| cli.artifact_prefix.clone())
            .unwrap_or_else(|| source_log.clone());
        let artifact_extension = exports
            .artifact_extension
            .unwrap_or_else(|| cli.artifact_extension.clone());
        let naming = ArtifactNaming::new(artifact_prefix, artifact_extension)
            .context("Invalid artifact prefix or extension")?;

        let max_concurrent_exports = exports
            .max_concurrent_exports
            .unwrap_or(cli.max_concurrent_exports);
        if max_concurrent_exports == 0 {
            bail!("max_concurrent_exports must be at least 1");
        }

        let export_delay =
            Duration::from_millis(exports.export_delay_ms.unwrap_or(cli.export_delay_ms));

        Ok(Self {
            logs_dir,
            source_log,
            naming,
            max_concurrent_exports,
            export_delay,
        })
    }

    pub fn source_log_path(&self) -> PathBuf {
        self.logs_dir.join(&self.source_log)
    }

    pub fn export_settings(&self) -> ExportSettings {
        ExportSettings {
            exports_dir: self.logs_dir.clone(),
            source_log: self.source_log_path(),
            naming: self.naming.clone(),
            max_concurrent_exports: self.max_concurrent_exports,
            processing_delay: self.export_delay,
        }
    }
}

fn validate_file_component(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        bail!("{} must not be empty", name);
    }
    if value.contains('/') || value.contains('\\') {
        bail!("{} must not contain a path separator: {}", name, value);
    }
    Ok(())
}
