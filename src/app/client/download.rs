//! App artifact downloads with atomic writes and streaming
//!
//! Each download resolves the release to fetch, streams the body into a
//! temporary file beside the target and renames it into place. A failure at
//! any step is returned as a [`DownloadResult`] value rather than an error so
//! the caller can carry on with the next app.

use std::path::{Path, PathBuf};

use reqwest::header::{HeaderName, CONTENT_DISPOSITION, LAST_MODIFIED};
use serde::Deserialize;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::app::client::config::Endpoints;
use crate::app::client::http::HttpHandler;
use crate::app::client::session::Session;
use crate::app::models::{AppEntry, DownloadOutcome, DownloadResult};
use crate::constants::files;
use crate::errors::{AuthError, DownloadError, FetchResult};

/// One element of the release listing; the first one is the latest
#[derive(Debug, Deserialize)]
struct ReleaseInfo {
    name: String,
}

/// An artifact written to disk
#[derive(Debug)]
struct Fetched {
    path: PathBuf,
    bytes: u64,
    version: String,
    last_modified: Option<String>,
}

impl Fetched {
    fn into_result(self, app: AppEntry) -> DownloadResult {
        DownloadResult {
            app,
            outcome: DownloadOutcome::Success {
                path: self.path,
                bytes: self.bytes,
                version: self.version,
                last_modified: self.last_modified,
            },
        }
    }
}

/// File download operations handler
pub struct DownloadHandler<'a> {
    http_handler: &'a HttpHandler,
    endpoints: &'a Endpoints,
}

impl<'a> DownloadHandler<'a> {
    /// Creates a new DownloadHandler over the given HTTP handler and endpoints
    pub fn new(http_handler: &'a HttpHandler, endpoints: &'a Endpoints) -> Self {
        Self {
            http_handler,
            endpoints,
        }
    }

    /// Downloads one app into `output_dir`
    ///
    /// Never fails: network, status, empty-body, filesystem and session
    /// problems are all reported as a failed [`DownloadResult`].
    pub async fn download(
        &self,
        session: &Session,
        entry: &AppEntry,
        output_dir: &Path,
    ) -> DownloadResult {
        finish(entry, self.try_download(session, entry, output_dir).await)
    }

    async fn try_download(
        &self,
        session: &Session,
        entry: &AppEntry,
        output_dir: &Path,
    ) -> FetchResult<Fetched> {
        let version = match &entry.version {
            Some(version) => version.clone(),
            None => self.latest_release(session, &entry.identifier).await?,
        };
        self.fetch(session, entry, &version, output_dir).await
    }

    /// Brings an installed app up to its latest release
    ///
    /// `installed` is the release already on disk. When it matches the latest
    /// release nothing is downloaded and the result is
    /// [`DownloadOutcome::UpToDate`]. Otherwise the latest release is saved as
    /// `<identifier>-<version>.<ext>`. Like [`download`](Self::download) this
    /// never fails.
    pub async fn update(
        &self,
        session: &Session,
        entry: &AppEntry,
        installed: Option<&str>,
        output_dir: &Path,
    ) -> DownloadResult {
        let latest = match self.latest_release(session, &entry.identifier).await {
            Ok(latest) => latest,
            Err(e) => return finish(entry, Err(e)),
        };

        if installed == Some(latest.as_str()) {
            tracing::info!("{} is up to date (version {})", entry.identifier, latest);
            return DownloadResult::up_to_date(entry.clone(), latest);
        }

        tracing::info!(
            "Update available for {}: {} -> {}",
            entry.identifier,
            installed.unwrap_or("none"),
            latest
        );
        let target = AppEntry::pinned(entry.identifier.clone(), latest.clone());
        finish(entry, self.fetch(session, &target, &latest, output_dir).await)
    }

    /// Downloads `version` of `target` to `output_dir/<target file name>`
    async fn fetch(
        &self,
        session: &Session,
        target: &AppEntry,
        version: &str,
        output_dir: &Path,
    ) -> FetchResult<Fetched> {
        let url = self.endpoints.download_url(&target.identifier, version)?;

        tracing::debug!("Fetching {} from {}", target, url);
        let mut response = self.http_handler.get_authorized(&url, session).await?;
        check_status(&response, &url)?;

        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        let extension = artifact_extension(header(CONTENT_DISPOSITION).as_deref());
        let last_modified = header(LAST_MODIFIED);

        tokio::fs::create_dir_all(output_dir).await?;
        let destination = output_dir.join(target.file_name(&extension));
        let temp_path = temp_path_for(&destination);

        let bytes = match stream_to_file(&mut response, &temp_path).await {
            Ok(0) => {
                remove_temp(&temp_path).await;
                return Err(DownloadError::EmptyBody);
            }
            Ok(bytes) => bytes,
            Err(e) => {
                remove_temp(&temp_path).await;
                return Err(e);
            }
        };

        // Replaces any file left by a previous run
        if tokio::fs::rename(&temp_path, &destination).await.is_err() {
            remove_temp(&temp_path).await;
            return Err(DownloadError::AtomicOperationFailed {
                temp_path,
                final_path: destination,
            });
        }

        Ok(Fetched {
            path: destination,
            bytes,
            version: version.to_string(),
            last_modified,
        })
    }

    /// Asks Splunkbase for the latest release of `identifier`
    async fn latest_release(&self, session: &Session, identifier: &str) -> FetchResult<String> {
        let url = self.endpoints.releases_url(identifier)?;
        let response = self.http_handler.get_authorized(&url, session).await?;
        check_status(&response, &url)?;

        let releases: Vec<ReleaseInfo> =
            response
                .json()
                .await
                .map_err(|e| DownloadError::VersionResolution {
                    identifier: identifier.to_string(),
                    reason: e.to_string(),
                })?;

        let latest = releases
            .into_iter()
            .next()
            .map(|release| release.name)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| DownloadError::VersionResolution {
                identifier: identifier.to_string(),
                reason: "no releases published".to_string(),
            })?;

        tracing::debug!("Latest release of {} is {}", identifier, latest);
        Ok(latest)
    }
}

/// Turns a fetch attempt into the per-app result, logging either way
fn finish(entry: &AppEntry, attempt: FetchResult<Fetched>) -> DownloadResult {
    match attempt {
        Ok(fetched) => {
            tracing::info!(
                "Downloaded {} ({} bytes) to {}",
                entry,
                fetched.bytes,
                fetched.path.display()
            );
            fetched.into_result(entry.clone())
        }
        Err(e) => {
            tracing::warn!("Failed to download {}: {}", entry, e);
            DownloadResult::failure(entry.clone(), e.to_string())
        }
    }
}

/// Maps a non-success status to the matching download error
fn check_status(response: &reqwest::Response, url: &Url) -> FetchResult<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    match status.as_u16() {
        401 => Err(AuthError::SessionExpired.into()),
        404 => Err(DownloadError::NotFound {
            url: url.to_string(),
        }),
        code => Err(DownloadError::ServerError { status: code }),
    }
}

/// Writes the response body chunk by chunk, returning the byte count
async fn stream_to_file(response: &mut reqwest::Response, path: &Path) -> FetchResult<u64> {
    let mut file = File::create(path).await?;
    let mut written = 0u64;

    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    Ok(written)
}

async fn remove_temp(path: &Path) {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        let _ = tokio::fs::remove_file(path).await;
    }
}

/// `<destination>.part`, kept in the same directory so the rename is atomic
fn temp_path_for(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_os_string();
    name.push(files::TEMP_FILE_SUFFIX);
    PathBuf::from(name)
}

/// Picks the artifact extension from a `Content-Disposition` header
///
/// Falls back to `tgz` when the header is absent or names no usable extension.
pub fn artifact_extension(content_disposition: Option<&str>) -> String {
    let file_name = content_disposition.and_then(|header| {
        header.split(';').map(str::trim).find_map(|param| {
            let (key, value) = param.split_once('=')?;
            match key.trim().to_ascii_lowercase().as_str() {
                "filename" => Some(value.trim().trim_matches('"').to_string()),
                // RFC 5987: filename*=UTF-8''name.tgz
                "filename*" => value
                    .rsplit_once("''")
                    .map(|(_, name)| name.trim_matches('"').to_string()),
                _ => None,
            }
        })
    });

    let Some(file_name) = file_name.map(|name| name.to_ascii_lowercase()) else {
        return files::DEFAULT_ARTIFACT_EXTENSION.to_string();
    };

    if file_name.ends_with(".tar.gz") {
        return "tar.gz".to_string();
    }

    Path::new(&file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(str::to_string)
        .unwrap_or_else(|| files::DEFAULT_ARTIFACT_EXTENSION.to_string())
}
