//! Command-line interface components
//!
//! This module contains CLI-specific code for Splunkbase Fetcher: argument
//! parsing, the run handler and progress display.

pub mod args;
pub mod commands;
pub mod progress;

pub use args::{Cli, GlobalArgs, RunArgs};
pub use commands::{exit_code, handle_run, handle_run_with};
pub use progress::{ProgressConfig, ProgressDisplay};
