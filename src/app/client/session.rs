//! Authenticated Splunkbase session
//!
//! A [`Session`] is the capability handed out by a successful login. It holds
//! the cookies issued by the server and is attached by reference to every
//! download request. It is never written to disk.

use std::fmt;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::header::{HeaderValue, COOKIE};
use reqwest::RequestBuilder;

use crate::errors::{AuthError, AuthResult};

/// Session issued by the marketplace login endpoint
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    cookie_header: String,
    expiry: Option<DateTime<Utc>>,
}

impl Session {
    /// Creates a session from name/value cookie pairs
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MalformedResponse` if no cookies were issued
    pub fn from_cookies<I, N, V>(cookies: I, expiry: Option<DateTime<Utc>>) -> AuthResult<Self>
    where
        I: IntoIterator<Item = (N, V)>,
        N: AsRef<str>,
        V: AsRef<str>,
    {
        let cookie_header = cookies
            .into_iter()
            .map(|(name, value)| format!("{}={}", name.as_ref(), value.as_ref()))
            .collect::<Vec<_>>()
            .join("; ");

        if cookie_header.is_empty() {
            return Err(AuthError::MalformedResponse {
                reason: "login succeeded but no session cookie was issued".to_string(),
            });
        }

        Ok(Self {
            cookie_header,
            expiry,
        })
    }

    /// Builds a session from the cookies set on a login response
    ///
    /// Cookies the server is clearing (empty value or an expiry already in the
    /// past) are dropped. The session expires when the first remaining cookie
    /// does.
    pub fn from_response(response: &reqwest::Response) -> AuthResult<Self> {
        let now = Utc::now();
        let issued = response.cookies().map(|cookie| {
            let expiry = cookie
                .max_age()
                .and_then(|age| ChronoDuration::from_std(age).ok())
                .map(|age| now + age)
                .or_else(|| cookie.expires().map(DateTime::<Utc>::from));
            (cookie.name().to_string(), cookie.value().to_string(), expiry)
        });
        Self::from_issued(issued, now)
    }

    /// Keeps the cookies still live at `now` and derives the session expiry
    fn from_issued<I>(issued: I, now: DateTime<Utc>) -> AuthResult<Self>
    where
        I: IntoIterator<Item = (String, String, Option<DateTime<Utc>>)>,
    {
        let mut pairs = Vec::new();
        let mut expiry: Option<DateTime<Utc>> = None;

        for (name, value, cookie_expiry) in issued {
            if value.is_empty() || cookie_expiry.is_some_and(|at| at <= now) {
                tracing::debug!("Ignoring cleared cookie {}", name);
                continue;
            }
            if let Some(at) = cookie_expiry {
                expiry = Some(expiry.map_or(at, |current| current.min(at)));
            }
            pairs.push((name, value));
        }

        Self::from_cookies(pairs, expiry)
    }

    /// When the session stops being valid, if the server said so
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expiry
    }

    /// Whether the session is known to be expired at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|expiry| expiry <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Attaches the session cookie to a request
    pub fn authorize(&self, request: RequestBuilder) -> AuthResult<RequestBuilder> {
        if self.is_expired() {
            return Err(AuthError::SessionExpired);
        }
        let value =
            HeaderValue::from_str(&self.cookie_header).map_err(|e| AuthError::MalformedResponse {
                reason: format!("session cookie is not a valid header value: {}", e),
            })?;
        Ok(request.header(COOKIE, value))
    }

    /// Raw `Cookie` header value
    pub fn cookie_header(&self) -> &str {
        &self.cookie_header
    }
}

// Cookie values are credentials; keep them out of logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("cookie_header", &"<redacted>")
            .field("expiry", &self.expiry)
            .finish()
    }
}
