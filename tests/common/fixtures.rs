#![allow(dead_code)]

//! Test fixtures: a temporary logs directory with a known source log.

use super::constants::*;
use log_export_engine::log_export::{ExportSettings, JobId, JobStatus, LogExportService};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

pub struct TestLogsDir {
    dir: TempDir,
}

impl TestLogsDir {
    /// Creates a logs directory containing `app.log` with [`SOURCE_LINES`].
    pub fn new() -> Self {
        let logs = Self::empty();
        logs.write_source(SOURCE_LINES);
        logs
    }

    /// Creates a logs directory without a source log.
    pub fn empty() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp logs dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn source_path(&self) -> PathBuf {
        self.dir.path().join("app.log")
    }

    pub fn write_source(&self, lines: &[&str]) {
        let mut content = lines.join("\n");
        content.push('\n');
        fs::write(self.source_path(), content).expect("Failed to write source log");
    }

    pub fn remove_source(&self) {
        fs::remove_file(self.source_path()).expect("Failed to remove source log");
    }

    /// Places a file that looks like an export from a previous run.
    pub fn add_artifact(&self, id: JobId, date: &str, lines: &[&str]) -> String {
        let file_name = format!("app.log.{}.{}.log", id, date);
        fs::write(self.dir.path().join(&file_name), lines.join("\n"))
            .expect("Failed to write artifact");
        file_name
    }

    pub fn settings(&self, delay: Duration) -> ExportSettings {
        let mut settings = ExportSettings::new(self.dir.path(), self.source_path());
        settings.processing_delay = delay;
        settings
    }

    pub fn open_service(&self) -> LogExportService {
        LogExportService::open(self.settings(Duration::ZERO))
    }

    pub fn open_slow_service(&self, delay: Duration) -> LogExportService {
        LogExportService::open(self.settings(delay))
    }

    /// Names of all export files in the directory, sorted.
    pub fn artifact_names(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.dir.path())
            .expect("Failed to list logs dir")
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name != "app.log")
            .collect();
        names.sort();
        names
    }
}

/// Waits for a job to reach a terminal state, failing the test on timeout.
pub async fn wait_for(service: &LogExportService, id: JobId) -> JobStatus {
    tokio::time::timeout(JOB_TIMEOUT, service.wait_until_terminal(id, POLL_INTERVAL))
        .await
        .expect("Job did not finish in time")
        .expect("Job disappeared while waiting")
}
