//! Application state shared across views.

use std::sync::Arc;

use tracing::debug;

use crate::api::{AuthenticatedClient, ProductsApi, PublicClient, RefreshCoordinator};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::HttpContext;
use crate::session::{AuthStateHandle, SessionController};
use crate::store::{CredentialStore, FileCredentialStore, SessionCookieFile};

/// Everything a front-end needs, wired together.
///
/// This struct is cheaply cloneable via `Arc`. All clients share one HTTP
/// client (and so one cookie jar), one credential store and one state handle.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ClientConfig,
    http: HttpContext,
    store: Arc<dyn CredentialStore>,
    cookies: Option<SessionCookieFile>,
    session: SessionController,
    api: AuthenticatedClient,
    products: ProductsApi,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.inner.config)
            .field("session", &self.inner.session)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Create the application state over an existing credential store.
    ///
    /// # Arguments
    ///
    /// * `config` - Client configuration
    /// * `store` - Credential slot shared by every client
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Network` if the HTTP client cannot be built.
    pub fn new(config: ClientConfig, store: Arc<dyn CredentialStore>) -> Result<Self, ApiError> {
        Self::build(config, store, None)
    }

    /// Create the application state with the persistent file stores.
    ///
    /// Both the access credential and the session cookies are restored from
    /// the data directory, so a new process picks up where the last one left
    /// off. Call [`persist_session_cookies`](Self::persist_session_cookies)
    /// before exiting to save cookie changes.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Store` if a stored value cannot be read, or
    /// `ApiError::Network` if the HTTP client cannot be built.
    pub fn from_config(config: ClientConfig) -> Result<Self, ApiError> {
        let store = FileCredentialStore::open(
            &config.data_dir,
            &config.api_url,
            &config.credential_key,
        )?;
        let cookies = SessionCookieFile::new(&config.data_dir, &config.api_url);
        Self::build(config, Arc::new(store), Some(cookies))
    }

    fn build(
        config: ClientConfig,
        store: Arc<dyn CredentialStore>,
        cookies: Option<SessionCookieFile>,
    ) -> Result<Self, ApiError> {
        let http = HttpContext::new(config.api_url.clone())?;
        if let Some(slot) = &cookies
            && let Some(saved) = slot.load()?
        {
            debug!("Restoring saved session cookies");
            http.restore_session_cookies(&saved);
        }

        let state = AuthStateHandle::new();
        let public = PublicClient::new(http.clone(), config.request_timeout);
        let refresher = RefreshCoordinator::new(Arc::new(public.clone()), Arc::clone(&store));

        let api = AuthenticatedClient::new(
            http.clone(),
            Arc::clone(&store),
            refresher,
            state.clone(),
            config.auth_timeout,
        );
        let session = SessionController::new(public, Arc::clone(&store), state);
        let products = ProductsApi::new(api.clone(), config.low_stock_threshold);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                http,
                store,
                cookies,
                session,
                api,
                products,
            }),
        })
    }

    /// Save the jar's session cookies for the next process.
    ///
    /// No-op for state built with [`new`](Self::new).
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Store` if the cookie slot cannot be written.
    pub fn persist_session_cookies(&self) -> Result<(), ApiError> {
        let Some(slot) = &self.inner.cookies else {
            return Ok(());
        };
        match self.inner.http.session_cookies() {
            Some(header) => slot.save(&header)?,
            None => slot.clear()?,
        }
        Ok(())
    }

    /// Get a reference to the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Get a reference to the credential store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.inner.store
    }

    /// Get a reference to the session controller.
    #[must_use]
    pub fn session(&self) -> &SessionController {
        &self.inner.session
    }

    /// Get a reference to the authenticated API client.
    #[must_use]
    pub fn api(&self) -> &AuthenticatedClient {
        &self.inner.api
    }

    /// Get a reference to the products API.
    #[must_use]
    pub fn products(&self) -> &ProductsApi {
        &self.inner.products
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use stockwatch_core::Credential;

    use super::*;
    use crate::session::AuthState;
    use crate::store::MemoryCredentialStore;

    #[test]
    fn test_new_starts_loading_and_shares_store() {
        let config = ClientConfig::for_api_url("http://127.0.0.1:5000").unwrap();
        let store: Arc<dyn CredentialStore> = Arc::new(MemoryCredentialStore::new());
        let state = AppState::new(config, Arc::clone(&store)).unwrap();

        assert_eq!(state.session().state(), AuthState::Loading);
        assert_eq!(state.products().low_stock_threshold(), 5);

        store.set(Credential::new("shared")).unwrap();
        assert_eq!(state.store().get().unwrap(), Some(Credential::new("shared")));

        // No cookie slot to write to
        state.persist_session_cookies().unwrap();
    }

    #[test]
    fn test_from_config_round_trips_session_cookies() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ClientConfig::for_api_url("http://127.0.0.1:5000").unwrap();
        config.data_dir = dir.path().to_path_buf();

        let slot = SessionCookieFile::new(&config.data_dir, &config.api_url);
        slot.save("authToken=abc").unwrap();

        let state = AppState::from_config(config.clone()).unwrap();
        assert_eq!(
            state.inner.http.session_cookies().as_deref(),
            Some("authToken=abc")
        );

        state.persist_session_cookies().unwrap();
        assert_eq!(slot.load().unwrap().as_deref(), Some("authToken=abc"));

        state.inner.http.clear_session_cookies();
        state.persist_session_cookies().unwrap();
        assert!(slot.load().unwrap().is_none());
    }
}
