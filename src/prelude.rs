//! Prelude module for Splunkbase Fetcher Library
//!
//! Re-exports the items most integrations need, so a single
//! `use splunkbase_fetcher::prelude::*;` is enough.
//!
//! # Usage
//!
//! ```rust,no_run
//! use splunkbase_fetcher::prelude::*;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<()> {
//!     let resolver = ConfigResolver::new().with_config_file(Some(PathBuf::from("splunkbase.yaml")));
//!     let mut runner = Runner::new(false);
//!
//!     if let RunOutcome::Completed(report) = runner.run(resolver, &mut NoProgress).await? {
//!         print!("{}", report.render_text());
//!     }
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result};

// Configuration
pub use crate::config::{ConfigResolver, ConfigSource, Settings};

// Client, models and orchestration
pub use crate::app::{
    AppEntry, AppListLoader, AppSource, DownloadOutcome, DownloadResult, NoProgress,
    RunObserver, RunOutcome, RunReport, RunState, Runner, Session, SplunkbaseClient,
};

// Commonly used constants
pub use crate::constants::{
    DEFAULT_RATE_LIMIT_RPS, ENV_PASSWORD, ENV_USERNAME, SPLUNKBASE_API_URL, SPLUNKBASE_BASE_URL,
    USER_AGENT,
};

// Standard library re-exports that are commonly needed
pub use std::path::{Path, PathBuf};

pub use tokio;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_imports() {
        let entry = AppEntry::pinned("appA", "1.0");
        assert_eq!(entry.file_name("tgz"), "appA-1.0.tgz");

        let runner = Runner::new(true);
        assert_eq!(runner.state(), RunState::Init);

        assert!(SPLUNKBASE_BASE_URL.starts_with("https://"));
        assert!(SPLUNKBASE_API_URL.starts_with("https://"));
    }

    #[tokio::test]
    async fn test_prelude_integration_pattern() {
        use tempfile::TempDir;

        let temp_dir = TempDir::new().unwrap();
        let list = temp_dir.path().join("apps.txt");
        tokio::fs::write(&list, "appA\nappB@2.0\n").await.unwrap();

        let entries = AppListLoader::load(&AppSource::File(list)).await.unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_std_reexports() {
        let path = PathBuf::from("/tmp/test");
        assert_eq!(Path::new("/tmp/test"), path.as_path());
    }
}
