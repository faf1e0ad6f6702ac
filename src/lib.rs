//! Splunkbase Fetcher Library
//!
//! Authenticates against the Splunkbase marketplace and downloads a configured
//! list of apps into a local directory, sequentially and rate limited.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
