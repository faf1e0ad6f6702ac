//! Application constants for Splunkbase Fetcher
//!
//! Constants are grouped by functional domain.

use std::time::Duration;

/// Environment variable names
pub mod env {
    /// Prefix shared by every environment setting
    pub const PREFIX: &str = "SPLUNK_ASD_";

    /// Environment variable name for the Splunkbase username
    pub const USERNAME: &str = "SPLUNK_ASD_USERNAME";

    /// Environment variable name for the Splunkbase password
    pub const PASSWORD: &str = "SPLUNK_ASD_PASSWORD";

    /// Default env file looked up in the working directory
    pub const DEFAULT_ENV_FILE: &str = ".env";
}

/// Splunkbase service URLs and endpoint paths
pub mod splunkbase {
    /// Site base URL (login and release metadata)
    pub const BASE_URL: &str = "https://splunkbase.splunk.com";

    /// API base URL (artifact downloads)
    pub const API_URL: &str = "https://api.splunkbase.splunk.com";

    /// Login endpoint path segments, relative to the base URL
    pub const LOGIN_SEGMENTS: &[&str] = &["api", "account:login", ""];

    /// Release listing path segments (`{id}` is substituted), relative to the base URL
    pub const RELEASES_SEGMENTS: &[&str] = &["api", "v1", "app", "{id}", "release", ""];

    /// Release download path segments, relative to the API URL
    pub const DOWNLOAD_SEGMENTS: &[&str] = &[
        "api", "v2", "apps", "{id}", "releases", "{version}", "download", "",
    ];

    /// Query string sent with every download request
    pub const DOWNLOAD_QUERY: &str = "origin=sb&lead=false";
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = concat!("Splunkbase-Fetcher/", env!("CARGO_PKG_VERSION"));

    /// Default HTTP request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
}

/// Rate limiting
pub mod limits {
    use std::num::NonZeroU32;

    /// Default rate limit for Splunkbase requests (requests per second)
    pub const DEFAULT_RATE_LIMIT_RPS: NonZeroU32 = match NonZeroU32::new(5) {
        Some(rate) => rate,
        None => panic!("default rate limit must be non-zero"),
    };
}

/// File operation constants
pub mod files {
    /// Temporary file suffix for atomic operations
    pub const TEMP_FILE_SUFFIX: &str = ".part";

    /// Extension used when the server does not name the artifact
    pub const DEFAULT_ARTIFACT_EXTENSION: &str = "tgz";

    /// Config file names looked up in the working directory, in order
    pub const LOCAL_CONFIG_FILES: &[&str] = &[
        "splunkbase.yaml",
        "splunkbase.yml",
        "splunkbase.ini",
        "splunkbase.conf",
        "splunkbase.toml",
    ];

    /// Directory under the user config dir holding `config.yaml`
    pub const USER_CONFIG_DIR: &str = "splunkbase-fetcher";
}

// Re-export commonly used constants for convenience
pub use env::{PASSWORD as ENV_PASSWORD, USERNAME as ENV_USERNAME};
pub use http::{DEFAULT_TIMEOUT as HTTP_TIMEOUT, USER_AGENT};
pub use limits::DEFAULT_RATE_LIMIT_RPS;
pub use splunkbase::{API_URL as SPLUNKBASE_API_URL, BASE_URL as SPLUNKBASE_BASE_URL};
