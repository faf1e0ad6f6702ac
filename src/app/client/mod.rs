//! HTTP client for the Splunkbase marketplace
//!
//! The module is organized into specialized components:
//! - `config`: HTTP client configuration and endpoint building
//! - `auth`: the login round trip
//! - `session`: the session capability returned by login
//! - `http`: rate-limited request primitives
//! - `download`: artifact downloads with atomic writes

use std::path::Path;

use crate::app::models::{AppEntry, DownloadResult};
use crate::config::Settings;
use crate::errors::{AuthError, AuthResult};

pub mod auth;
pub mod config;
pub mod download;
pub mod http;
pub mod session;

pub use config::{ClientConfig, Endpoints};
pub use session::Session;

use auth::AuthHandler;
use download::DownloadHandler;
use http::HttpHandler;

/// HTTP client for interacting with Splunkbase
///
/// Holds no session state of its own: [`login`](Self::login) hands out a
/// [`Session`] which the caller passes back to every download.
#[derive(Debug)]
pub struct SplunkbaseClient {
    http_handler: HttpHandler,
    endpoints: Endpoints,
}

impl SplunkbaseClient {
    /// Creates a client with explicit configuration and endpoints
    ///
    /// # Errors
    ///
    /// Returns `AuthError` if the HTTP client cannot be built
    pub fn new(config: ClientConfig, endpoints: Endpoints) -> AuthResult<Self> {
        let client = config.build_http_client()?;
        let http_handler = HttpHandler::new(client, config.rate_limit_rps);

        tracing::debug!(
            "Created Splunkbase client for {} / {}",
            endpoints.base_url(),
            endpoints.api_url()
        );

        Ok(Self {
            http_handler,
            endpoints,
        })
    }

    /// Creates a client from resolved settings
    pub fn from_settings(settings: &Settings) -> AuthResult<Self> {
        Self::new(settings.client_config(), settings.endpoints.clone())
    }

    /// Logs in and returns the session to attach to later requests
    ///
    /// # Errors
    ///
    /// Returns `AuthError` if the login request fails or is rejected
    pub async fn login(&self, username: &str, password: &str) -> AuthResult<Session> {
        let login_url = self
            .endpoints
            .login_url()
            .map_err(|e| AuthError::MalformedResponse {
                reason: e.to_string(),
            })?;
        AuthHandler::login(&self.http_handler, &login_url, username, password).await
    }

    /// Downloads one app into `output_dir`
    ///
    /// Failures are part of the returned value; see [`DownloadHandler::download`].
    pub async fn download(
        &self,
        session: &Session,
        entry: &AppEntry,
        output_dir: &Path,
    ) -> DownloadResult {
        DownloadHandler::new(&self.http_handler, &self.endpoints)
            .download(session, entry, output_dir)
            .await
    }

    /// Downloads the latest release unless `installed` already is it
    ///
    /// See [`DownloadHandler::update`].
    pub async fn update(
        &self,
        session: &Session,
        entry: &AppEntry,
        installed: Option<&str>,
        output_dir: &Path,
    ) -> DownloadResult {
        DownloadHandler::new(&self.http_handler, &self.endpoints)
            .update(session, entry, installed, output_dir)
            .await
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }
}
