//! Naming contract for export artifacts.
//!
//! Artifacts are named `<prefix>.<job id>.<date>.<extension>`. The job id is
//! the first dot-delimited integer segment after the prefix, which is what the
//! allocator, the recovery scan and the status lookup all rely on. Partial
//! files and failure markers append a suffix to the artifact name and keep
//! their id claimed.

use super::error::ExportError;
use super::job::JobId;
use regex::Regex;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Suffix of artifacts that are still being written.
pub const PARTIAL_SUFFIX: &str = ".part";

/// Suffix of the marker left behind by a failed export. It holds the failure
/// reason and keeps the job id claimed across restarts.
pub const FAILED_SUFFIX: &str = ".failed";

const MAX_DATE_TOKEN_LEN: usize = 64;

const UNKNOWN_FAILURE: &str = "Export failed in a previous run";

#[derive(Debug, Clone)]
pub struct ArtifactNaming {
    prefix: String,
    extension: String,
    id_pattern: Regex,
}

impl ArtifactNaming {
    /// Builds the naming scheme for `prefix` and `extension`.
    ///
    /// Fails if either part is empty or contains a path separator, or if the
    /// extension would make finished artifacts look like partial files or
    /// failure markers.
    pub fn new(
        prefix: impl Into<String>,
        extension: impl Into<String>,
    ) -> Result<Self, ExportError> {
        let prefix = prefix.into();
        let extension = extension.into();
        validate_component("prefix", &prefix)?;
        validate_component("extension", &extension)?;

        let suffix = format!(".{}", extension);
        if let Some(reserved) = [PARTIAL_SUFFIX, FAILED_SUFFIX]
            .into_iter()
            .find(|reserved| suffix.ends_with(reserved))
        {
            return Err(ExportError::InvalidNaming(format!(
                "extension {:?} collides with the reserved {:?} suffix",
                extension, reserved
            )));
        }

        let id_pattern = Regex::new(&format!(r"^{}\.(\d+)\.", regex::escape(&prefix)))
            .map_err(|e| ExportError::InvalidNaming(e.to_string()))?;
        Ok(Self {
            prefix,
            extension,
            id_pattern,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn file_name(&self, id: JobId, date: &str) -> String {
        format!("{}.{}.{}.{}", self.prefix, id, date, self.extension)
    }

    /// Extracts the job id from any file carrying the naming pattern,
    /// including partially written artifacts.
    pub fn parse_id(&self, file_name: &str) -> Option<JobId> {
        self.id_pattern
            .captures(file_name)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .filter(|id| *id > 0)
    }

    /// Like [`Self::parse_id`], but only for fully written artifacts.
    pub fn parse_artifact_id(&self, file_name: &str) -> Option<JobId> {
        if file_name.ends_with(PARTIAL_SUFFIX) || file_name.ends_with(FAILED_SUFFIX) {
            return None;
        }
        self.parse_id(file_name)
    }

    /// Like [`Self::parse_id`], but only for failure markers.
    pub fn parse_failed_id(&self, file_name: &str) -> Option<JobId> {
        if !file_name.ends_with(FAILED_SUFFIX) {
            return None;
        }
        self.parse_id(file_name)
    }
}

impl Default for ArtifactNaming {
    fn default() -> Self {
        Self::new("app.log", "log").expect("default artifact naming is valid")
    }
}

fn validate_component(name: &str, value: &str) -> Result<(), ExportError> {
    if value.is_empty() {
        return Err(ExportError::InvalidNaming(format!("{} must not be empty", name)));
    }
    if value.contains('/') || value.contains('\\') {
        return Err(ExportError::InvalidNaming(format!(
            "{} must not contain a path separator: {}",
            name, value
        )));
    }
    Ok(())
}

/// Path under which an artifact is written before being renamed into place.
pub fn partial_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Path of the marker recording that the export to `target` failed.
pub fn failed_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(FAILED_SUFFIX);
    PathBuf::from(name)
}

/// Failure reason stored in the marker at `path`.
pub fn read_failure_reason(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(reason) if !reason.trim().is_empty() => reason.trim().to_string(),
        Ok(_) => UNKNOWN_FAILURE.to_string(),
        Err(e) => {
            debug!("Could not read failure marker {:?}: {}", path, e);
            UNKNOWN_FAILURE.to_string()
        }
    }
}

/// Checks that a date token can be used both as a filter and inside a file name.
pub fn validate_date_token(date: &str) -> Result<(), ExportError> {
    if date.trim().is_empty() {
        return Err(ExportError::InvalidDate("date must not be empty".to_string()));
    }
    if date.len() > MAX_DATE_TOKEN_LEN {
        return Err(ExportError::InvalidDate(format!(
            "date must be at most {} characters",
            MAX_DATE_TOKEN_LEN
        )));
    }
    if date.starts_with('.') {
        return Err(ExportError::InvalidDate(format!(
            "date must not start with '.': {}",
            date
        )));
    }
    if let Some(c) = date
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')))
    {
        return Err(ExportError::InvalidDate(format!(
            "unsupported character {:?} in {}",
            c, date
        )));
    }
    Ok(())
}
