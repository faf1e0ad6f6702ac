//! Run orchestration
//!
//! A run walks a fixed sequence of states:
//!
//! ```text
//! Init -> Configured -> Authenticated -> Downloading -> Done
//! ```
//!
//! Errors before `Downloading` abort the run. Errors while downloading are
//! recorded per app in the [`RunReport`] and the run carries on. Downloads are
//! strictly sequential and share one immutable [`Session`].
//!
//! With update tracking the apps file is a JSON list of installed releases:
//! apps already at their latest release are skipped, and each newly
//! downloaded release is written back to the file.

use std::fmt;
use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use tracing::{debug, info, warn};

use crate::app::app_list::{AppListLoader, AppSource};
use crate::app::client::{Session, SplunkbaseClient};
use crate::app::models::{AppEntry, DownloadOutcome, DownloadResult};
use crate::app::report::{DryRunPlan, RunReport};
use crate::app::tracking::TrackedApps;
use crate::config::{ConfigResolver, Settings};
use crate::errors::{AppError, Result};

/// Stage of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunState {
    Init,
    Configured,
    Authenticated,
    Downloading,
    Done,
}

impl RunState {
    /// The only state reachable from this one
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Init => Some(Self::Configured),
            Self::Configured => Some(Self::Authenticated),
            Self::Authenticated => Some(Self::Downloading),
            Self::Downloading => Some(Self::Done),
            Self::Done => None,
        }
    }

    /// Moves to `target`, which must be the direct successor
    ///
    /// # Errors
    ///
    /// Returns an error for skipped or backward transitions
    pub fn advance(&mut self, target: RunState) -> Result<()> {
        if self.next() != Some(target) {
            return Err(AppError::generic(format!(
                "Invalid run state transition from {} to {}",
                self, target
            )));
        }
        debug!("Run state: {} -> {}", self, target);
        *self = target;
        Ok(())
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Configured => "configured",
            Self::Authenticated => "authenticated",
            Self::Downloading => "downloading",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Receives progress notifications while downloading
///
/// All methods default to doing nothing.
pub trait RunObserver {
    fn downloads_started(&mut self, _total: usize) {}
    fn item_started(&mut self, _index: usize, _entry: &AppEntry) {}
    fn item_finished(&mut self, _index: usize, _result: &DownloadResult) {}
    fn downloads_finished(&mut self) {}
}

/// Observer that ignores every notification
#[derive(Debug, Default)]
pub struct NoProgress;

impl RunObserver for NoProgress {}

/// Result of [`Runner::run`]
#[derive(Debug)]
pub enum RunOutcome {
    /// Dry run: nothing was contacted or written
    Planned(DryRunPlan),
    /// Downloads were attempted for every entry
    Completed(RunReport),
}

/// Drives one run from configuration to report
#[derive(Debug)]
pub struct Runner {
    state: RunState,
    dry_run: bool,
    track_updates: bool,
}

impl Runner {
    pub fn new(dry_run: bool) -> Self {
        Self {
            state: RunState::Init,
            dry_run,
            track_updates: false,
        }
    }

    /// Treats the versions in a JSON apps file as installed releases
    pub fn with_update_tracking(mut self, enabled: bool) -> Self {
        self.track_updates = enabled;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Resolves configuration and performs the run
    ///
    /// # Errors
    ///
    /// Returns a fatal `AppError` for configuration, app list, login or
    /// output directory problems. Per-app download failures are not errors.
    pub async fn run<O: RunObserver>(
        &mut self,
        resolver: ConfigResolver,
        observer: &mut O,
    ) -> Result<RunOutcome> {
        let settings = resolver.resolve().await?;
        self.state.advance(RunState::Configured)?;
        self.run_with_settings(&settings, observer).await
    }

    /// Performs the run with already resolved settings
    pub async fn run_with_settings<O: RunObserver>(
        &mut self,
        settings: &Settings,
        observer: &mut O,
    ) -> Result<RunOutcome> {
        if self.state == RunState::Init {
            self.state.advance(RunState::Configured)?;
        }

        let tracked_path = if self.track_updates {
            Some(TrackedApps::check_path(settings.apps_file.as_deref())?.to_path_buf())
        } else {
            None
        };

        if self.dry_run {
            let entries = load_entries(settings).await?;
            info!("Dry run: {} app(s) planned, no network access", entries.len());
            return Ok(RunOutcome::Planned(DryRunPlan {
                output_dir: settings.output_dir.clone(),
                entries,
            }));
        }

        let client = SplunkbaseClient::from_settings(settings)?;
        info!("Logging in to Splunkbase as {}", settings.username);
        let session = client
            .login(&settings.username, settings.password.expose())
            .await?;
        self.state.advance(RunState::Authenticated)?;
        info!("Login successful");

        let (entries, mut tracked) = match &tracked_path {
            Some(path) => {
                let tracked = TrackedApps::load(path).await?;
                (tracked.entries().to_vec(), Some(tracked))
            }
            None => (load_entries(settings).await?, None),
        };

        tokio::fs::create_dir_all(&settings.output_dir)
            .await
            .map_err(|e| {
                AppError::generic(format!(
                    "Failed to create output directory {}: {}",
                    settings.output_dir.display(),
                    e
                ))
            })?;

        self.state.advance(RunState::Downloading)?;
        let report = download_all(
            &client,
            &session,
            settings,
            &entries,
            tracked.as_mut(),
            observer,
        )
        .await;
        self.state.advance(RunState::Done)?;

        if report.all_succeeded() {
            info!(
                "All {} app(s) processed ({} downloaded, {} up to date)",
                report.total, report.succeeded, report.up_to_date
            );
        } else {
            warn!(
                "{} of {} app(s) failed",
                report.failed, report.total
            );
        }
        Ok(RunOutcome::Completed(report))
    }
}

async fn load_entries(settings: &Settings) -> Result<Vec<AppEntry>> {
    let source = AppSource::from_settings(settings.apps_file.as_deref(), &settings.inline_apps)?;
    Ok(AppListLoader::load(&source).await?)
}

async fn download_all<O: RunObserver>(
    client: &SplunkbaseClient,
    session: &Session,
    settings: &Settings,
    entries: &[AppEntry],
    mut tracked: Option<&mut TrackedApps>,
    observer: &mut O,
) -> RunReport {
    let started_at = Utc::now();
    let start = Instant::now();
    let mut results = Vec::with_capacity(entries.len());

    observer.downloads_started(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        observer.item_started(index, entry);
        let result = match tracked.as_deref_mut() {
            Some(tracked) => {
                update_one(client, session, tracked, entry, &settings.output_dir).await
            }
            None => client.download(session, entry, &settings.output_dir).await,
        };
        observer.item_finished(index, &result);
        results.push(result);
    }
    observer.downloads_finished();

    RunReport::new(
        started_at,
        start.elapsed(),
        settings.output_dir.clone(),
        results,
    )
}

/// Updates one tracked app and records a new release in the apps file
///
/// A failed write of the apps file is logged; the download itself stands.
async fn update_one(
    client: &SplunkbaseClient,
    session: &Session,
    tracked: &mut TrackedApps,
    entry: &AppEntry,
    output_dir: &std::path::Path,
) -> DownloadResult {
    let installed = tracked.installed_version(&entry.identifier);
    let result = client
        .update(session, entry, installed.as_deref(), output_dir)
        .await;

    if let DownloadOutcome::Success {
        version,
        last_modified,
        ..
    } = &result.outcome
    {
        let updated_time = last_modified
            .clone()
            .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));

        if !tracked.record(&entry.identifier, version, &updated_time) {
            warn!(
                "App {} not found in {}",
                entry.identifier,
                tracked.path().display()
            );
        } else if let Err(e) = tracked.save().await {
            warn!("Failed to record {} {}: {}", entry.identifier, version, e);
        } else {
            info!(
                "Updated {} with new version for {}: {}",
                tracked.path().display(),
                entry.identifier,
                version
            );
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigLayer, ConfigSource, Field};
    use httpmock::prelude::*;
    use tempfile::TempDir;

    fn settings_for(server: &MockServer, output: &std::path::Path, apps: &str) -> Settings {
        let mut layer = ConfigLayer::new(ConfigSource::Cli);
        layer.set(Field::Username, "alice");
        layer.set(Field::Password, "pw");
        layer.set(Field::OutputDir, output.to_string_lossy());
        layer.set(Field::AppsList, apps);
        layer.set(Field::BaseUrl, server.base_url());
        layer.set(Field::ApiUrl, server.base_url());
        layer.set(Field::RateLimit, "100");
        Settings::from_layers(&[layer, ConfigLayer::defaults()]).unwrap()
    }

    #[derive(Default)]
    struct Recorder {
        started: Option<usize>,
        finished: Vec<bool>,
        done: bool,
    }

    impl RunObserver for Recorder {
        fn downloads_started(&mut self, total: usize) {
            self.started = Some(total);
        }
        fn item_finished(&mut self, _index: usize, result: &DownloadResult) {
            self.finished.push(result.is_success());
        }
        fn downloads_finished(&mut self) {
            self.done = true;
        }
    }

    #[test]
    fn test_state_machine_is_forward_only() {
        let mut state = RunState::Init;
        assert!(state.advance(RunState::Authenticated).is_err());
        state.advance(RunState::Configured).unwrap();
        state.advance(RunState::Authenticated).unwrap();
        assert!(state.advance(RunState::Configured).is_err());
        state.advance(RunState::Downloading).unwrap();
        state.advance(RunState::Done).unwrap();
        assert!(state.advance(RunState::Done).is_err());
        assert_eq!(state, RunState::Done);
        assert_eq!(RunState::Done.next(), None);
    }

    #[tokio::test]
    async fn test_run_downloads_in_order_and_notifies_observer() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/account:login/");
                then.status(200)
                    .header("Set-Cookie", "sessionid=abc; Path=/");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v2/apps/appA/releases/1.0/download/");
                then.status(200).body("A");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v2/apps/appB/releases/2.0/download/");
                then.status(500);
            })
            .await;

        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("out");
        let settings = settings_for(&server, &output, "appA@1.0,appB@2.0");

        let mut runner = Runner::new(false);
        let mut recorder = Recorder::default();
        let outcome = runner
            .run_with_settings(&settings, &mut recorder)
            .await
            .unwrap();

        let report = match outcome {
            RunOutcome::Completed(report) => report,
            other => panic!("Expected a completed run, got {:?}", other),
        };
        assert_eq!(runner.state(), RunState::Done);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.results[0].app.identifier, "appA");
        assert_eq!(report.results[1].app.identifier, "appB");
        assert!(output.join("appA-1.0.tgz").exists());
        assert_eq!(recorder.started, Some(2));
        assert_eq!(recorder.finished, vec![true, false]);
        assert!(recorder.done);
    }

    #[tokio::test]
    async fn test_login_failure_is_fatal() {
        let server = MockServer::start_async().await;
        let login = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/account:login/");
                then.status(401);
            })
            .await;
        let download = server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(200).body("x");
            })
            .await;

        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("out");
        let settings = settings_for(&server, &output, "appA@1.0");

        let mut runner = Runner::new(false);
        let err = runner
            .run_with_settings(&settings, &mut NoProgress)
            .await
            .unwrap_err();

        assert!(err.is_fatal());
        assert!(matches!(err, AppError::Auth(_)));
        assert_eq!(runner.state(), RunState::Configured);
        login.assert_async().await;
        assert_eq!(download.hits_async().await, 0);
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_dry_run_makes_no_requests() {
        let server = MockServer::start_async().await;
        let any = server
            .mock_async(|when, then| {
                when.any_request();
                then.status(200);
            })
            .await;

        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("out");
        let settings = settings_for(&server, &output, "appA,appB@2.0");

        let mut runner = Runner::new(true);
        let outcome = runner
            .run_with_settings(&settings, &mut NoProgress)
            .await
            .unwrap();

        match outcome {
            RunOutcome::Planned(plan) => assert_eq!(plan.entries.len(), 2),
            other => panic!("Expected a plan, got {:?}", other),
        }
        assert_eq!(any.hits_async().await, 0);
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_update_run_skips_current_and_records_new_release() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/account:login/");
                then.status(200)
                    .header("Set-Cookie", "sessionid=abc; Path=/");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/app/appA/release/");
                then.status(200).body(r#"[{"name": "1.0"}]"#);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/app/appB/release/");
                then.status(200).body(r#"[{"name": "2.1"}, {"name": "2.0"}]"#);
            })
            .await;
        let stale = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v2/apps/appA/releases/1.0/download/");
                then.status(200).body("A");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v2/apps/appB/releases/2.1/download/");
                then.status(200)
                    .header("Last-Modified", "Tue, 03 Sep 2024 10:00:00 GMT")
                    .body("B");
            })
            .await;

        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("out");
        let apps_file = temp_dir.path().join("apps.json");
        tokio::fs::write(
            &apps_file,
            r#"[{"uid": "appA", "version": "1.0"}, {"uid": "appB", "version": "2.0"}]"#,
        )
        .await
        .unwrap();
        let mut settings = settings_for(&server, &output, "ignored");
        settings.apps_file = Some(apps_file.clone());

        let mut runner = Runner::new(false).with_update_tracking(true);
        let mut recorder = Recorder::default();
        let report = match runner.run_with_settings(&settings, &mut recorder).await.unwrap() {
            RunOutcome::Completed(report) => report,
            other => panic!("Expected a completed run, got {:?}", other),
        };

        assert_eq!(report.up_to_date, 1);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 0);
        assert!(report.all_succeeded());
        assert_eq!(stale.hits_async().await, 0);
        assert!(output.join("appB-2.1.tgz").exists());
        assert_eq!(recorder.finished, vec![false, true]);

        let saved: Vec<serde_json::Value> =
            serde_json::from_str(&tokio::fs::read_to_string(&apps_file).await.unwrap()).unwrap();
        assert_eq!(saved[0]["version"], "1.0");
        assert!(saved[0].get("updated_time").is_none());
        assert_eq!(saved[1]["version"], "2.1");
        assert_eq!(saved[1]["updated_time"], "Tue, 03 Sep 2024 10:00:00 GMT");
    }

    #[tokio::test]
    async fn test_update_run_needs_json_apps_file() {
        let server = MockServer::start_async().await;
        let any = server
            .mock_async(|when, then| {
                when.any_request();
                then.status(200);
            })
            .await;

        let temp_dir = TempDir::new().unwrap();
        let settings = settings_for(&server, &temp_dir.path().join("out"), "appA@1.0");

        let mut runner = Runner::new(false).with_update_tracking(true);
        let err = runner
            .run_with_settings(&settings, &mut NoProgress)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::AppList(crate::errors::AppListError::TrackingUnsupported { .. })
        ));
        assert_eq!(any.hits_async().await, 0);
    }
}
