//! Splunkbase authentication
//!
//! Login is a single form POST. A 2xx answer carrying at least one cookie
//! yields a [`Session`]; anything else is fatal for the run.

use url::Url;

use crate::app::client::http::HttpHandler;
use crate::app::client::session::Session;
use crate::errors::{AuthError, AuthResult};

/// Handles Splunkbase authentication operations
pub struct AuthHandler;

impl AuthHandler {
    /// Logs in and returns the issued session
    ///
    /// # Errors
    ///
    /// Returns `AuthError` if:
    /// - The request cannot be sent
    /// - The server answers with a non-success status
    /// - The answer carries no session cookie
    pub async fn login(
        http: &HttpHandler,
        login_url: &Url,
        username: &str,
        password: &str,
    ) -> AuthResult<Session> {
        tracing::info!("Authenticating with Splunkbase as {}", username);

        let response = http
            .post_form(login_url, &[("username", username), ("password", password)])
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Splunkbase login rejected for {}: HTTP {}", username, status);
            return Err(AuthError::LoginFailed {
                status: status.as_u16(),
            });
        }

        let session = Session::from_response(&response)?;
        match session.expiry() {
            Some(expiry) => tracing::info!("Authentication successful, session valid until {}", expiry),
            None => tracing::info!("Authentication successful"),
        }

        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroU32;
    use crate::app::client::config::ClientConfig;
    use httpmock::prelude::*;

    fn handler() -> HttpHandler {
        let client = ClientConfig::default().build_http_client().unwrap();
        HttpHandler::new(client, NonZeroU32::new(50).unwrap())
    }

    #[tokio::test]
    async fn test_login_success_captures_cookies() {
        let server = MockServer::start_async().await;
        let login = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/account:login/")
                    .body_contains("username=alice")
                    .body_contains("password=secret");
                then.status(200)
                    .header("Set-Cookie", "sessionid=abc123; Path=/; Max-Age=3600")
                    .body("<feed><id>token</id></feed>");
            })
            .await;

        let url = Url::parse(&server.url("/api/account:login/")).unwrap();
        let session = AuthHandler::login(&handler(), &url, "alice", "secret")
            .await
            .unwrap();

        login.assert_async().await;
        assert_eq!(session.cookie_header(), "sessionid=abc123");
        assert!(session.expiry().is_some());
        assert!(!session.is_expired());
    }

    #[tokio::test]
    async fn test_login_ignores_cookies_being_cleared() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/account:login/");
                then.status(200)
                    .header("Set-Cookie", "sessionid=abc; Path=/; Max-Age=3600")
                    .header(
                        "Set-Cookie",
                        "messages=; expires=Thu, 01 Jan 1970 00:00:00 GMT; Max-Age=0; Path=/",
                    );
            })
            .await;

        let url = Url::parse(&server.url("/api/account:login/")).unwrap();
        let session = AuthHandler::login(&handler(), &url, "alice", "secret")
            .await
            .unwrap();

        assert_eq!(session.cookie_header(), "sessionid=abc");
        assert!(!session.is_expired());
        assert!(session
            .authorize(reqwest::Client::new().get("http://localhost/"))
            .is_ok());
    }

    #[tokio::test]
    async fn test_login_bad_credentials() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/account:login/");
                then.status(401).body("Invalid credentials");
            })
            .await;

        let url = Url::parse(&server.url("/api/account:login/")).unwrap();
        let err = AuthHandler::login(&handler(), &url, "alice", "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::LoginFailed { status: 401 }));
    }

    #[tokio::test]
    async fn test_login_without_cookie_is_malformed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/account:login/");
                then.status(200).body("ok");
            })
            .await;

        let url = Url::parse(&server.url("/api/account:login/")).unwrap();
        let err = AuthHandler::login(&handler(), &url, "alice", "secret")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MalformedResponse { .. }));
    }
}
