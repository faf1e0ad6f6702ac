//! Progress display for the download loop
//!
//! Shows an indicatif bar over the app list when stderr is a terminal and
//! falls back to plain log lines otherwise. Quiet and JSON modes disable it.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::app::{AppEntry, DownloadOutcome, DownloadResult, RunObserver};

/// Configuration for progress display
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Enable visual progress bars
    pub enable_progress_bars: bool,
    /// Spinner tick interval
    pub tick_interval: Duration,
    /// Maximum width for app names in the bar message
    pub max_name_width: usize,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enable_progress_bars: true,
            tick_interval: Duration::from_millis(120),
            max_name_width: 40,
        }
    }
}

/// Progress reporting for one run
pub struct ProgressDisplay {
    config: ProgressConfig,
    bar: Option<ProgressBar>,
    is_terminal: bool,
    total: usize,
    failed: usize,
}

impl ProgressDisplay {
    /// Create a new progress display with the given configuration
    pub fn new(config: ProgressConfig) -> Self {
        let is_terminal = atty::is(atty::Stream::Stderr);
        Self {
            config,
            bar: None,
            is_terminal,
            total: 0,
            failed: 0,
        }
    }

    /// Display that never draws a bar
    pub fn disabled() -> Self {
        Self::new(ProgressConfig {
            enable_progress_bars: false,
            ..Default::default()
        })
    }

    fn bars_enabled(&self) -> bool {
        self.config.enable_progress_bars && self.is_terminal
    }

    fn create_bar(&self, total: usize) -> ProgressBar {
        let bar = ProgressBar::new(total as u64);
        match ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            Ok(style) => bar.set_style(style.progress_chars("##-")),
            Err(e) => warn!("Progress bar template error: {}", e),
        }
        bar.enable_steady_tick(self.config.tick_interval);
        bar
    }

    fn truncate(&self, name: &str) -> String {
        if name.chars().count() <= self.config.max_name_width {
            return name.to_string();
        }
        let keep = self.config.max_name_width.saturating_sub(3);
        format!("{}...", name.chars().take(keep).collect::<String>())
    }

    /// Number of failures seen so far
    pub fn failed(&self) -> usize {
        self.failed
    }
}

impl RunObserver for ProgressDisplay {
    fn downloads_started(&mut self, total: usize) {
        self.total = total;
        self.failed = 0;
        if self.bars_enabled() {
            self.bar = Some(self.create_bar(total));
        } else {
            info!("Downloading {} app(s)", total);
        }
    }

    fn item_started(&mut self, index: usize, entry: &AppEntry) {
        let name = self.truncate(&entry.to_string());
        match &self.bar {
            Some(bar) => bar.set_message(format!("Downloading {}", name)),
            None => info!("[{}/{}] Downloading {}", index + 1, self.total, name),
        }
    }

    fn item_finished(&mut self, index: usize, result: &DownloadResult) {
        if result.is_failure() {
            self.failed += 1;
        }
        match &self.bar {
            Some(bar) => {
                if let Some(reason) = result.reason() {
                    bar.println(format!("Failed: {} ({})", result.app, reason));
                }
                bar.inc(1);
            }
            None => match &result.outcome {
                DownloadOutcome::Success { path, .. } => info!(
                    "[{}/{}] Saved {} to {}",
                    index + 1,
                    self.total,
                    result.app,
                    path.display()
                ),
                DownloadOutcome::UpToDate { version } => info!(
                    "[{}/{}] {} is up to date ({})",
                    index + 1,
                    self.total,
                    result.app,
                    version
                ),
                DownloadOutcome::Failure { reason } => warn!(
                    "[{}/{}] Failed to download {}: {}",
                    index + 1,
                    self.total,
                    result.app,
                    reason
                ),
            },
        }
    }

    fn downloads_finished(&mut self) {
        if let Some(bar) = self.bar.take() {
            if self.failed == 0 {
                bar.finish_with_message("Download completed");
            } else {
                bar.finish_with_message(format!("Completed with {} failure(s)", self.failed));
            }
        }
    }
}
