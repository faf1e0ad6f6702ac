//! HTTP client configuration and endpoint building
//!
//! This module handles the construction of the HTTP client and of every
//! Splunkbase URL the client talks to.

use std::num::NonZeroU32;
use std::time::Duration;

use reqwest::Client;
use url::Url;

use crate::constants::{http, limits, splunkbase};
use crate::errors::{AuthError, AuthResult, DownloadError, FetchResult};

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout
    pub request_timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Connection pool idle timeout
    pub pool_idle_timeout: Option<Duration>,
    /// Optional proxy applied to all schemes
    pub proxy: Option<String>,
    /// Rate limit (requests per second)
    pub rate_limit_rps: NonZeroU32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: http::DEFAULT_TIMEOUT,
            connect_timeout: http::CONNECT_TIMEOUT,
            pool_idle_timeout: Some(http::POOL_IDLE_TIMEOUT),
            proxy: None,
            rate_limit_rps: limits::DEFAULT_RATE_LIMIT_RPS,
        }
    }
}

impl ClientConfig {
    /// Builds the HTTP client with the specified configuration
    ///
    /// The client keeps no cookie jar: the session cookie is attached
    /// explicitly to each request by the caller.
    pub fn build_http_client(&self) -> AuthResult<Client> {
        let mut client_builder = Client::builder()
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(http::USER_AGENT);

        if let Some(idle_timeout) = self.pool_idle_timeout {
            client_builder = client_builder.pool_idle_timeout(idle_timeout);
        }

        if let Some(proxy) = &self.proxy {
            client_builder = client_builder.proxy(reqwest::Proxy::all(proxy.as_str())?);
        }

        client_builder.build().map_err(AuthError::Http)
    }
}

/// Splunkbase endpoints derived from the configured base URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base_url: Url,
    api_url: Url,
}

impl Endpoints {
    /// The public Splunkbase site and API
    pub fn splunkbase() -> FetchResult<Self> {
        Ok(Self::new(
            parse_base(splunkbase::BASE_URL)?,
            parse_base(splunkbase::API_URL)?,
        ))
    }

    /// Creates endpoints from a site URL and an API URL
    pub fn new(base_url: Url, api_url: Url) -> Self {
        Self { base_url, api_url }
    }

    /// Uses one URL for both the site and the API (mock servers, mirrors)
    pub fn single(url: Url) -> Self {
        Self {
            base_url: url.clone(),
            api_url: url,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    /// Login endpoint
    pub fn login_url(&self) -> FetchResult<Url> {
        build_url(&self.base_url, splunkbase::LOGIN_SEGMENTS, &[])
    }

    /// Release listing for one app
    pub fn releases_url(&self, identifier: &str) -> FetchResult<Url> {
        build_url(
            &self.base_url,
            splunkbase::RELEASES_SEGMENTS,
            &[("{id}", identifier)],
        )
    }

    /// Artifact download for one app release
    pub fn download_url(&self, identifier: &str, version: &str) -> FetchResult<Url> {
        let mut url = build_url(
            &self.api_url,
            splunkbase::DOWNLOAD_SEGMENTS,
            &[("{id}", identifier), ("{version}", version)],
        )?;
        url.set_query(Some(splunkbase::DOWNLOAD_QUERY));
        Ok(url)
    }
}

fn parse_base(url: &str) -> FetchResult<Url> {
    Url::parse(url).map_err(|e| DownloadError::InvalidUrl {
        url: url.to_string(),
        error: e.to_string(),
    })
}

/// Appends path segments to `base`, substituting placeholders.
///
/// Segments are percent-encoded, so identifiers can never escape their slot.
fn build_url(base: &Url, segments: &[&str], substitutions: &[(&str, &str)]) -> FetchResult<Url> {
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);

    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| DownloadError::InvalidUrl {
                url: base.to_string(),
                error: "URL cannot be a base".to_string(),
            })?;
        path.pop_if_empty();
        for &segment in segments {
            let value = substitutions
                .iter()
                .find(|(placeholder, _)| *placeholder == segment)
                .map(|(_, value)| *value)
                .unwrap_or(segment);
            path.push(value);
        }
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.rate_limit_rps, limits::DEFAULT_RATE_LIMIT_RPS);
        assert_eq!(config.request_timeout, http::DEFAULT_TIMEOUT);
        assert!(config.proxy.is_none());
    }

    #[test]
    fn test_http_client_creation() {
        let config = ClientConfig::default();
        assert!(config.build_http_client().is_ok());
    }

    #[test]
    fn test_http_client_with_proxy() {
        let config = ClientConfig {
            proxy: Some("http://proxy.internal:3128".to_string()),
            ..Default::default()
        };
        assert!(config.build_http_client().is_ok());
    }

    #[test]
    fn test_default_endpoints() {
        let endpoints = Endpoints::splunkbase().unwrap();
        assert_eq!(
            endpoints.login_url().unwrap().as_str(),
            "https://splunkbase.splunk.com/api/account:login/"
        );
        assert_eq!(
            endpoints.releases_url("742").unwrap().as_str(),
            "https://splunkbase.splunk.com/api/v1/app/742/release/"
        );
        assert_eq!(
            endpoints.download_url("742", "8.2.0").unwrap().as_str(),
            "https://api.splunkbase.splunk.com/api/v2/apps/742/releases/8.2.0/download/?origin=sb&lead=false"
        );
    }

    #[test]
    fn test_endpoints_keep_base_path_prefix() {
        let endpoints = Endpoints::single(Url::parse("http://mirror.local/splunkbase/").unwrap());
        assert_eq!(
            endpoints.login_url().unwrap().as_str(),
            "http://mirror.local/splunkbase/api/account:login/"
        );
    }

    #[test]
    fn test_identifier_is_percent_encoded() {
        let endpoints = Endpoints::splunkbase().unwrap();
        let url = endpoints.releases_url("a b?c").unwrap();
        assert_eq!(url.query(), None);
        assert!(url.path().contains("a%20b%3Fc"));
    }
}
