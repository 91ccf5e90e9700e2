//! Bearer-authenticated API calls.
//!
//! Every call goes through [`AuthenticatedClient::execute`], which attaches
//! the stored credential and applies the one retry this client ever makes:
//!
//! 1. Send with the current credential (no `Authorization` header if none).
//! 2. On 401, refresh through the [`RefreshCoordinator`], read the store
//!    again and resend the same request once.
//! 3. A second 401, or a failed refresh, clears the store, expires the
//!    session and fails with `ApiError::SessionExpired`.
//!
//! Transport failures fail immediately with `ApiError::Network` and never
//! trigger a refresh. Every other status is handed back untouched.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use stockwatch_core::Credential;
use tracing::{debug, error, instrument, warn};

use super::refresh::RefreshCoordinator;
use crate::error::ApiError;
use crate::http::HttpContext;
use crate::session::AuthStateHandle;
use crate::store::CredentialStore;

/// A request that can be sent more than once.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    method: Method,
    path: String,
    body: Option<serde_json::Value>,
    headers: HeaderMap,
}

impl PendingRequest {
    /// Build a request for `path` relative to the API base URL.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: HeaderMap::new(),
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    #[must_use]
    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Add an extra header.
    ///
    /// `Authorization` is ignored: the client sets it from the credential
    /// store on every send, and leaves it out when the store is empty.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        if name == AUTHORIZATION {
            debug!("Ignoring caller-supplied Authorization header");
            return self;
        }
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Client for calls that carry the bearer credential.
#[derive(Clone)]
pub struct AuthenticatedClient {
    inner: Arc<AuthenticatedClientInner>,
}

struct AuthenticatedClientInner {
    http: HttpContext,
    store: Arc<dyn CredentialStore>,
    refresher: RefreshCoordinator,
    state: AuthStateHandle,
    timeout: Duration,
}

impl std::fmt::Debug for AuthenticatedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedClient")
            .field("base_url", &self.inner.http.base_url().as_str())
            .field("refresher", &self.inner.refresher)
            .field("timeout", &self.inner.timeout)
            .finish_non_exhaustive()
    }
}

impl AuthenticatedClient {
    /// Create a client sharing `store` and `state` with the session controller.
    #[must_use]
    pub fn new(
        http: HttpContext,
        store: Arc<dyn CredentialStore>,
        refresher: RefreshCoordinator,
        state: AuthStateHandle,
        timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(AuthenticatedClientInner {
                http,
                store,
                refresher,
                state,
                timeout,
            }),
        }
    }

    /// The coordinator used to renew credentials.
    #[must_use]
    pub fn refresher(&self) -> &RefreshCoordinator {
        &self.inner.refresher
    }

    /// Send `request`, refreshing and retrying once on 401.
    ///
    /// Returns the response for any status other than 401, success or not.
    ///
    /// # Errors
    ///
    /// - `ApiError::Network` if no response was received
    /// - `ApiError::SessionExpired` if the credential could not be renewed or
    ///   the renewed one was rejected too
    /// - `ApiError::Store` if the credential store cannot be read
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn execute(&self, request: PendingRequest) -> Result<Response, ApiError> {
        // Captured before the credential is read, so a refresh that completes
        // in between is reused rather than repeated.
        let generation = self.inner.refresher.generation();
        let credential = self.current_credential()?;

        let response = self.send(&request, credential.as_ref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!("Credential rejected, refreshing");
        if let Err(e) = self.inner.refresher.refresh_after(generation).await {
            warn!(error = %e, "Could not renew credential");
            self.inner.state.expire();
            return Err(ApiError::SessionExpired);
        }

        // Read again after the refresh resolved; never reuse the stale value.
        let credential = self.current_credential()?;
        debug!("Retrying with renewed credential");
        let retried = self.send(&request, credential.as_ref()).await?;

        if retried.status() == StatusCode::UNAUTHORIZED {
            warn!("Renewed credential rejected, ending session");
            if let Err(e) = self.inner.store.clear() {
                error!(error = %e, "Failed to clear rejected credential");
            }
            self.inner.state.expire();
            return Err(ApiError::SessionExpired);
        }

        Ok(retried)
    }

    /// `GET path` and decode a JSON body.
    ///
    /// # Errors
    ///
    /// Everything [`execute`](Self::execute) returns, plus
    /// `ApiError::UnknownServer` for a non-2xx status and `ApiError::Decode`
    /// for a body that is not a `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.fetch_json(PendingRequest::get(path)).await
    }

    /// Execute `request` and decode a JSON body from a 2xx response.
    ///
    /// # Errors
    ///
    /// Everything [`execute`](Self::execute) returns, plus
    /// `ApiError::UnknownServer` for a non-2xx status and `ApiError::Decode`
    /// for a body that is not a `T`.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        request: PendingRequest,
    ) -> Result<T, ApiError> {
        let response = self.execute(request).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::UnknownServer(status));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::from_transport(&e))?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }

    fn current_credential(&self) -> Result<Option<Credential>, ApiError> {
        self.inner.store.get().map_err(|e| {
            error!(error = %e, "Failed to read credential store");
            self.inner.state.expire();
            ApiError::Store(e)
        })
    }

    async fn send(
        &self,
        request: &PendingRequest,
        credential: Option<&Credential>,
    ) -> Result<Response, ApiError> {
        let url = self.inner.http.url(&request.path)?;

        let mut builder = self
            .inner
            .http
            .client()
            .request(request.method.clone(), url)
            .timeout(self.inner.timeout)
            .headers(request.headers.clone());

        if let Some(credential) = credential {
            builder = builder.bearer_auth(credential.expose());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        builder
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))
    }
}
