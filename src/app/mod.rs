//! Core application logic for Splunkbase Fetcher
//!
//! This module contains the HTTP client and session handling, the app list
//! loader, installed-version tracking, data models, the run orchestration and
//! the run report.
//!
//! # Examples
//!
//! ```rust,no_run
//! use splunkbase_fetcher::app::{AppEntry, ClientConfig, Endpoints, SplunkbaseClient};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = SplunkbaseClient::new(ClientConfig::default(), Endpoints::splunkbase()?)?;
//! let session = client.login("alice", "secret").await?;
//!
//! let result = client
//!     .download(&session, &AppEntry::pinned("1876", "7.3.0"), Path::new("./out"))
//!     .await;
//! println!("{:?}", result.outcome);
//! # Ok(())
//! # }
//! ```

pub mod app_list;
pub mod client;
pub mod models;
pub mod report;
pub mod runner;
pub mod tracking;

// Re-export main public API
pub use app_list::{AppListLoader, AppSource};
pub use client::{ClientConfig, Endpoints, Session, SplunkbaseClient};
pub use models::{parse_app_line, AppEntry, DownloadOutcome, DownloadResult};
pub use report::{DryRunPlan, RunReport};
pub use runner::{NoProgress, RunObserver, RunOutcome, RunState, Runner};
pub use tracking::TrackedApps;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_structure() {
        let config = ClientConfig::default();
        assert!(config.rate_limit_rps.get() > 0);
        assert!(config.proxy.is_none());
        assert_eq!(RunState::Init.next(), Some(RunState::Configured));
    }
}
