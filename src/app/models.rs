//! Data models for Splunkbase Fetcher
//!
//! This module defines the app list entries and the per-download results
//! collected into the run report.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{AppListError, AppListResult};

/// One app to fetch, optionally pinned to a release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppEntry {
    /// Splunkbase app identifier (numeric uid or app name)
    pub identifier: String,
    /// Pinned release; `None` means the latest release
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl AppEntry {
    /// Creates an unpinned entry
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            version: None,
        }
    }

    /// Creates an entry pinned to `version`
    pub fn pinned(identifier: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            version: Some(version.into()),
        }
    }

    /// Output file stem: `<identifier>` or `<identifier>-<version>`
    pub fn file_stem(&self) -> String {
        match &self.version {
            Some(version) => format!("{}-{}", self.identifier, version),
            None => self.identifier.clone(),
        }
    }

    /// Output file name for an artifact with the given extension
    pub fn file_name(&self, extension: &str) -> String {
        format!("{}.{}", self.file_stem(), extension)
    }

    /// Validates that the entry can be used as a URL segment and a file name
    ///
    /// `line` is the 1-based position used in error messages.
    pub fn validate(&self, line: usize) -> AppListResult<()> {
        let invalid = |content: &str| AppListError::InvalidEntry {
            line,
            content: content.to_string(),
        };

        if !is_safe_component(&self.identifier) {
            return Err(invalid(&self.identifier));
        }
        if let Some(version) = &self.version {
            if !is_safe_component(version) {
                return Err(invalid(&format!("{}@{}", self.identifier, version)));
            }
        }
        Ok(())
    }
}

impl fmt::Display for AppEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}@{}", self.identifier, version),
            None => write!(f, "{}", self.identifier),
        }
    }
}

/// A component is safe when it cannot address anything outside the output dir
fn is_safe_component(value: &str) -> bool {
    !value.is_empty()
        && value != "."
        && value != ".."
        && !value.contains(['/', '\\', '\0'])
        && !value.chars().any(char::is_whitespace)
}

/// Parses one line of a plain-text app list
///
/// Accepts `identifier` or `identifier@version`. Returns `Ok(None)` for blank
/// lines and `#` comments.
///
/// # Errors
///
/// Returns `AppListError::InvalidEntry` if the line does not hold a usable entry
pub fn parse_app_line(line: &str, line_number: usize) -> AppListResult<Option<AppEntry>> {
    let content = match line.split_once('#') {
        Some((before, _)) => before.trim(),
        None => line.trim(),
    };

    if content.is_empty() {
        return Ok(None);
    }

    let entry = match content.split_once('@') {
        Some((identifier, version)) => {
            AppEntry::pinned(identifier.trim(), version.trim())
        }
        None => AppEntry::new(content),
    };

    entry.validate(line_number).map_err(|_| AppListError::InvalidEntry {
        line: line_number,
        content: line.to_string(),
    })?;

    Ok(Some(entry))
}

/// What happened to one app
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DownloadOutcome {
    /// Artifact written to `path`
    Success {
        path: PathBuf,
        bytes: u64,
        /// Release actually fetched (pinned or resolved)
        version: String,
        /// `Last-Modified` header of the download response
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_modified: Option<String>,
    },
    /// Update tracking only: the installed release is already the latest
    UpToDate { version: String },
    /// Nothing written; `reason` is the rendered error
    Failure { reason: String },
}

/// Result of one download attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadResult {
    pub app: AppEntry,
    #[serde(flatten)]
    pub outcome: DownloadOutcome,
}

impl DownloadResult {
    pub fn success(app: AppEntry, path: PathBuf, bytes: u64, version: String) -> Self {
        Self {
            app,
            outcome: DownloadOutcome::Success {
                path,
                bytes,
                version,
                last_modified: None,
            },
        }
    }

    pub fn up_to_date(app: AppEntry, version: String) -> Self {
        Self {
            app,
            outcome: DownloadOutcome::UpToDate { version },
        }
    }

    pub fn failure(app: AppEntry, reason: impl Into<String>) -> Self {
        Self {
            app,
            outcome: DownloadOutcome::Failure {
                reason: reason.into(),
            },
        }
    }

    /// Whether an artifact was written
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, DownloadOutcome::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, DownloadOutcome::Failure { .. })
    }

    /// Failure reason, if the download failed
    pub fn reason(&self) -> Option<&str> {
        match &self.outcome {
            DownloadOutcome::Failure { reason } => Some(reason),
            _ => None,
        }
    }
}
