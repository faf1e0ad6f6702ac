//! Core HTTP operations with rate limiting
//!
//! Every request goes through a client-side rate limiter. Requests are never
//! retried: a failed request is reported to the caller as is.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{clock::DefaultClock, state::InMemoryState, Jitter, Quota, RateLimiter};
use reqwest::Client;
use url::Url;

use crate::app::client::session::Session;
use crate::errors::{AuthResult, FetchResult};

type DirectRateLimiter = RateLimiter<governor::state::NotKeyed, InMemoryState, DefaultClock>;

/// HTTP operations handler
#[derive(Debug)]
pub struct HttpHandler {
    client: Client,
    rate_limiter: DirectRateLimiter,
}

impl HttpHandler {
    /// Creates a new HttpHandler with the given client and rate limiting
    pub fn new(client: Client, rate_limit_rps: NonZeroU32) -> Self {
        Self {
            client,
            rate_limiter: Self::build_rate_limiter(rate_limit_rps),
        }
    }

    fn build_rate_limiter(rate_limit_rps: NonZeroU32) -> DirectRateLimiter {
        RateLimiter::direct(Quota::per_second(rate_limit_rps))
    }

    async fn throttle(&self) {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(50)))
            .await;
    }

    /// Posts a URL-encoded form without any session attached
    pub async fn post_form(
        &self,
        url: &Url,
        form: &[(&str, &str)],
    ) -> AuthResult<reqwest::Response> {
        self.throttle().await;
        let response = self.client.post(url.as_str()).form(form).send().await?;
        tracing::debug!("POST {} -> {}", url, response.status());
        Ok(response)
    }

    /// Issues a GET with the session cookie attached
    ///
    /// The status is not checked here; callers map it to their own errors.
    pub async fn get_authorized(
        &self,
        url: &Url,
        session: &Session,
    ) -> FetchResult<reqwest::Response> {
        let request = session.authorize(self.client.get(url.as_str()))?;
        self.throttle().await;
        let response = request.send().await?;
        tracing::debug!("GET {} -> {}", url, response.status());
        Ok(response)
    }
}
