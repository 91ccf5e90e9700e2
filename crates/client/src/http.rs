//! Shared HTTP plumbing.
//!
//! Every client talks to the same API origin through one `reqwest::Client`
//! with a cookie jar, so the session cookie set by login is sent along with
//! validate, logout and reissue without any client handling it explicitly.
//!
//! The jar lives in memory. A front-end that restarts between calls (the CLI)
//! carries the session across with [`HttpContext::session_cookies`] and
//! [`HttpContext::restore_session_cookies`]. Logout empties it with
//! [`HttpContext::clear_session_cookies`] whatever the server answered.

use std::sync::{Arc, PoisonError, RwLock};

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use url::Url;

use crate::error::ApiError;

/// Cookie-carrying HTTP client bound to the API base URL.
#[derive(Clone, Debug)]
pub struct HttpContext {
    inner: Arc<HttpContextInner>,
}

struct HttpContextInner {
    client: reqwest::Client,
    jar: Arc<SessionJar>,
    base_url: Url,
}

/// Cookie jar that can be emptied in place.
///
/// `reqwest::cookie::Jar` only drops a cookie when a response expires it, so
/// the jar is swapped for a fresh one instead.
#[derive(Default)]
struct SessionJar {
    jar: RwLock<Jar>,
}

impl SessionJar {
    fn clear(&self) {
        *self.jar.write().unwrap_or_else(PoisonError::into_inner) = Jar::default();
    }

    fn add_cookie_str(&self, cookie: &str, url: &Url) {
        self.jar
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .add_cookie_str(cookie, url);
    }
}

impl CookieStore for SessionJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        self.jar
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .set_cookies(cookie_headers, url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.jar
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .cookies(url)
    }
}

impl std::fmt::Debug for HttpContextInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpContext")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpContext {
    /// Build a context with a fresh cookie store.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Network` if the TLS backend cannot be initialised.
    pub fn new(base_url: Url) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let jar = Arc::new(SessionJar::default());
        let client = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .default_headers(headers)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(HttpContextInner {
                client,
                jar,
                base_url,
            }),
        })
    }

    /// The underlying HTTP client.
    #[must_use]
    pub fn client(&self) -> &reqwest::Client {
        &self.inner.client
    }

    /// The API base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Cookies the jar would send to the API origin, as a `Cookie` header value.
    #[must_use]
    pub fn session_cookies(&self) -> Option<String> {
        self.inner
            .jar
            .cookies(&self.inner.base_url)
            .and_then(|value| value.to_str().ok().map(str::to_owned))
            .filter(|value| !value.is_empty())
    }

    /// Put cookies saved by [`session_cookies`](Self::session_cookies) back
    /// into the jar.
    pub fn restore_session_cookies(&self, header: &str) {
        for pair in header.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            self.inner.jar.add_cookie_str(pair, &self.inner.base_url);
        }
    }

    /// Forget every cookie, so no later call carries the old session.
    pub fn clear_session_cookies(&self) {
        self.inner.jar.clear();
    }

    /// Resolve an API path against the base URL.
    ///
    /// Leading slashes are ignored so `/users/login` and `users/login` both
    /// stay under a base that has a path prefix.
    ///
    /// # Errors
    ///
    /// Returns `url::ParseError` if the path is not a valid relative reference.
    pub fn url(&self, path: &str) -> Result<Url, url::ParseError> {
        self.inner.base_url.join(path.trim_start_matches('/'))
    }
}
