//! Command handler for Splunkbase Fetcher
//!
//! Wires parsed arguments to the runner and prints the outcome.

use std::time::Instant;

use tracing::{debug, info};

use crate::app::{RunOutcome, Runner};
use crate::cli::{ProgressConfig, ProgressDisplay, RunArgs};
use crate::config::ConfigResolver;
use crate::errors::{AppError, Result};

/// Exit status for a finished invocation
///
/// A run that completed exits 0 even when some apps failed; only a fatal
/// error exits 1.
pub fn exit_code(result: &Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

/// Handle a fetch run
///
/// Per-app failures are reported but do not make this return an error; only
/// configuration, app list, login and output directory problems do.
pub async fn handle_run(args: &RunArgs, quiet: bool) -> Result<()> {
    handle_run_with(args, quiet, args.resolver()).await
}

/// [`handle_run`] with an explicit configuration resolver
pub async fn handle_run_with(args: &RunArgs, quiet: bool, resolver: ConfigResolver) -> Result<()> {
    let start_time = Instant::now();

    if let Some(path) = resolver.config_path() {
        debug!("Config file candidate: {}", path.display());
    }

    let mut progress = ProgressDisplay::new(ProgressConfig {
        enable_progress_bars: !quiet && !args.json,
        ..Default::default()
    });

    let mut runner = Runner::new(args.dry_run).with_update_tracking(args.update);
    let outcome = runner.run(resolver, &mut progress).await?;

    match outcome {
        RunOutcome::Planned(plan) => {
            if args.json {
                println!("{}", render_json(plan.to_json())?);
            } else {
                print!("{}", plan.render_text());
            }
        }
        RunOutcome::Completed(report) => {
            if args.json {
                println!("{}", render_json(report.to_json())?);
            } else if !quiet || progress.failed() > 0 {
                println!();
                print!("{}", report.render_text());
            }
        }
    }

    info!("Run finished in {:?}", start_time.elapsed());
    Ok(())
}

fn render_json(rendered: serde_json::Result<String>) -> Result<String> {
    rendered.map_err(|e| AppError::generic(format!("Failed to render JSON report: {}", e)))
}
