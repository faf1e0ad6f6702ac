//! Run summary
//!
//! A [`RunReport`] holds one [`DownloadResult`] per app list entry, in list
//! order, plus counts and timing. It renders as text for humans or as JSON
//! for scripts.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::app::models::{AppEntry, DownloadOutcome, DownloadResult};

/// Outcome of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    pub output_dir: PathBuf,
    pub total: usize,
    pub succeeded: usize,
    /// Tracked apps already at their latest release
    pub up_to_date: usize,
    pub failed: usize,
    pub results: Vec<DownloadResult>,
}

impl RunReport {
    pub fn new(
        started_at: DateTime<Utc>,
        elapsed: Duration,
        output_dir: PathBuf,
        results: Vec<DownloadResult>,
    ) -> Self {
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        let failed = results.iter().filter(|r| r.is_failure()).count();
        Self {
            started_at,
            elapsed,
            output_dir,
            total: results.len(),
            succeeded,
            up_to_date: results.len() - succeeded - failed,
            failed,
            results,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    /// Failed entries with their reasons, in list order
    pub fn failures(&self) -> impl Iterator<Item = (&AppEntry, &str)> {
        self.results
            .iter()
            .filter_map(|r| r.reason().map(|reason| (&r.app, reason)))
    }

    /// Total bytes written by successful downloads
    pub fn bytes_downloaded(&self) -> u64 {
        self.results
            .iter()
            .map(|r| match r.outcome {
                DownloadOutcome::Success { bytes, .. } => bytes,
                DownloadOutcome::UpToDate { .. } | DownloadOutcome::Failure { .. } => 0,
            })
            .sum()
    }

    /// Human-readable summary
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Download Summary:");
        let _ = writeln!(out, "  Total apps: {}", self.total);
        let _ = writeln!(out, "  Succeeded: {}", self.succeeded);
        if self.up_to_date > 0 {
            let _ = writeln!(out, "  Up to date: {}", self.up_to_date);
        }
        let _ = writeln!(out, "  Failed: {}", self.failed);
        let _ = writeln!(out, "  Bytes written: {}", self.bytes_downloaded());
        let _ = writeln!(out, "  Output directory: {}", self.output_dir.display());
        let _ = writeln!(
            out,
            "  Elapsed: {}",
            humantime_serde::re::humantime::format_duration(round_to_millis(self.elapsed))
        );

        if !self.results.is_empty() {
            let _ = writeln!(out);
            for result in &self.results {
                match &result.outcome {
                    DownloadOutcome::Success { path, .. } => {
                        let _ = writeln!(out, "  ok    {} -> {}", result.app, path.display());
                    }
                    DownloadOutcome::UpToDate { version } => {
                        let _ = writeln!(out, "  skip  {}: up to date ({})", result.app, version);
                    }
                    DownloadOutcome::Failure { reason } => {
                        let _ = writeln!(out, "  FAIL  {}: {}", result.app, reason);
                    }
                }
            }
        }

        if !self.all_succeeded() {
            let failed: Vec<&str> = self
                .failures()
                .map(|(app, _)| app.identifier.as_str())
                .collect();
            let _ = writeln!(out);
            let _ = writeln!(out, "Failed apps: {}", failed.join(", "));
        }

        out
    }

    /// JSON rendering of the whole report
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn round_to_millis(duration: Duration) -> Duration {
    Duration::from_millis(duration.as_millis() as u64)
}

/// What a dry run would download
#[derive(Debug, Clone, Serialize)]
pub struct DryRunPlan {
    pub output_dir: PathBuf,
    pub entries: Vec<AppEntry>,
}

impl DryRunPlan {
    /// Target file stems; the extension is only known once the server answers
    pub fn planned_stems(&self) -> Vec<PathBuf> {
        self.entries
            .iter()
            .map(|entry| self.output_dir.join(entry.file_stem()))
            .collect()
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Dry run - would download {} app(s):", self.entries.len());
        for (index, (entry, stem)) in self.entries.iter().zip(self.planned_stems()).enumerate() {
            let _ = writeln!(out, "  {}. {} -> {}.*", index + 1, entry, stem.display());
        }
        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> RunReport {
        RunReport::new(
            Utc::now(),
            Duration::from_millis(1500),
            PathBuf::from("./out"),
            vec![
                DownloadResult::success(
                    AppEntry::new("appA"),
                    PathBuf::from("./out/appA.tgz"),
                    120,
                    "1.0.0".to_string(),
                ),
                DownloadResult::failure(AppEntry::new("appB"), "Not found: HTTP 404"),
            ],
        )
    }

    #[test]
    fn test_counts() {
        let report = sample_report();
        assert_eq!(report.total, 2);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert!(!report.all_succeeded());
        assert_eq!(report.bytes_downloaded(), 120);

        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0.identifier, "appB");
        assert_eq!(failures[0].1, "Not found: HTTP 404");
    }

    #[test]
    fn test_text_names_failed_apps() {
        let text = sample_report().render_text();
        assert!(text.contains("Succeeded: 1"));
        assert!(text.contains("Failed: 1"));
        assert!(text.contains("Failed apps: appB"));
        assert!(text.contains("Elapsed: 1s 500ms"));
    }

    #[test]
    fn test_json_shape() {
        let json: serde_json::Value =
            serde_json::from_str(&sample_report().to_json().unwrap()).unwrap();
        assert_eq!(json["total"], 2);
        assert_eq!(json["failed"], 1);
        assert_eq!(json["elapsed"], "1s 500ms");
        assert_eq!(json["results"][0]["status"], "success");
        assert_eq!(json["results"][1]["app"]["identifier"], "appB");
    }

    #[test]
    fn test_up_to_date_apps_are_not_failures() {
        let report = RunReport::new(
            Utc::now(),
            Duration::ZERO,
            PathBuf::from("./out"),
            vec![
                DownloadResult::up_to_date(AppEntry::new("appA"), "1.0".to_string()),
                DownloadResult::failure(AppEntry::new("appB"), "no releases published"),
            ],
        );
        assert_eq!(report.succeeded, 0);
        assert_eq!(report.up_to_date, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.bytes_downloaded(), 0);

        let text = report.render_text();
        assert!(text.contains("Up to date: 1"));
        assert!(text.contains("skip  appA: up to date (1.0)"));
        assert!(text.contains("Failed apps: appB"));
    }

    #[test]
    fn test_empty_report_succeeds() {
        let report = RunReport::new(Utc::now(), Duration::ZERO, PathBuf::from("."), Vec::new());
        assert!(report.all_succeeded());
        assert!(!report.render_text().contains("Failed apps"));
    }

    #[test]
    fn test_dry_run_plan() {
        let plan = DryRunPlan {
            output_dir: PathBuf::from("out"),
            entries: vec![AppEntry::new("appA"), AppEntry::pinned("appB", "2.0")],
        };
        assert_eq!(
            plan.planned_stems(),
            vec![PathBuf::from("out/appA"), PathBuf::from("out/appB-2.0")]
        );
        let text = plan.render_text();
        assert!(text.contains("would download 2 app(s)"));
        assert!(text.contains("appB@2.0"));
    }
}
