//! Error types for Splunkbase Fetcher
//!
//! Errors are split by the stage of a run that produces them. Configuration,
//! app list and login errors abort the run; download errors are recorded per
//! app and the run carries on.

use std::path::PathBuf;
use thiserror::Error;

/// Authentication-related errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// HTTP request failed during authentication
    #[error("HTTP request failed during authentication: {0}")]
    Http(#[from] reqwest::Error),

    /// Login rejected by the marketplace
    #[error("Splunkbase login failed with HTTP {status}. Please check your credentials")]
    LoginFailed { status: u16 },

    /// Login succeeded at the HTTP level but no session was issued
    #[error("Malformed login response: {reason}")]
    MalformedResponse { reason: String },

    /// Session expired or rejected by the server
    #[error("Splunkbase session expired or was rejected. Please re-run to log in again")]
    SessionExpired,
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Configuration file extension not recognised
    #[error("Unsupported configuration format: {path}. Expected .ini, .conf, .yaml, .yml or .toml")]
    UnsupportedFormat { path: PathBuf },

    /// Configuration file could not be parsed
    #[error("Failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    /// I/O error reading a configuration source
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Missing required configuration field
    #[error("Missing required configuration field: {field}")]
    MissingField { field: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// App list loading errors
#[derive(Error, Debug)]
pub enum AppListError {
    /// Neither an apps file nor an inline list was configured
    #[error("No app list configured. Pass --apps_file or set apps.file / apps.list in the config")]
    NoSource,

    /// App list file could not be read
    #[error("Failed to read app list {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Structured app list could not be parsed
    #[error("Failed to parse app list {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    /// An entry is not a usable identifier
    #[error("Invalid app entry at line {line}: {content:?}")]
    InvalidEntry { line: usize, content: String },

    /// A version written as a bare decimal number, whose text form is lost
    #[error("Version of {identifier} at entry {line} is an unquoted number. Quote it (e.g. \"8.10\") so the release name is kept exactly")]
    UnquotedVersion { line: usize, identifier: String },

    /// Update tracking was requested for a list it cannot write back to
    #[error("Update tracking needs a JSON apps file: {reason}")]
    TrackingUnsupported { reason: String },

    /// The list parsed but held no entries
    #[error("App list {source_name} contains no entries")]
    Empty { source_name: String },
}

/// Download errors, recorded per app
#[derive(Error, Debug)]
pub enum DownloadError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Session problem surfaced while downloading
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// I/O error during file operations
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid URL built for a request
    #[error("Invalid URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },

    /// Server returned error status
    #[error("Server error: HTTP {status}")]
    ServerError { status: u16 },

    /// Artifact not found on the marketplace
    #[error("Not found: HTTP 404 for {url}")]
    NotFound { url: String },

    /// Server answered with an empty body
    #[error("Empty response body")]
    EmptyBody,

    /// No release could be resolved for an unpinned app
    #[error("Could not resolve latest version for {identifier}: {reason}")]
    VersionResolution { identifier: String, reason: String },

    /// Atomic file operation failed
    #[error("Atomic file operation failed: could not rename {temp_path} to {final_path}")]
    AtomicOperationFailed {
        temp_path: PathBuf,
        final_path: PathBuf,
    },
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Authentication error
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// App list error
    #[error(transparent)]
    AppList(#[from] AppListError),

    /// Download error
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Whether the error ends the run
    ///
    /// Download errors are collected into the report; everything else aborts.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, AppError::Download(_))
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Auth(_) => "authentication",
            AppError::Config(_) => "config",
            AppError::AppList(_) => "app_list",
            AppError::Download(_) => "download",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Authentication result type alias
pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// App list result type alias
pub type AppListResult<T> = std::result::Result<T, AppListError>;

/// Download step result type alias
pub type FetchResult<T> = std::result::Result<T, DownloadError>;
