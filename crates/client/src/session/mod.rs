//! Session lifecycle.
//!
//! [`SessionController`] drives the [`AuthState`] machine:
//!
//! ```text
//! Loading ──start()──▶ Authenticated(session) | Anonymous
//! Anonymous ──login()──▶ Authenticated(session)
//! Authenticated ──logout() / expired credential──▶ Anonymous
//! ```
//!
//! The session record always comes from the server's validate answer, never
//! from the login response, so it reflects what the server actually holds.

mod state;

use std::sync::Arc;

use secrecy::SecretString;
use stockwatch_core::{Email, Registration, Session};
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

pub use state::{AuthState, AuthStateHandle};

use crate::api::{PublicClient, RegistrationResult};
use crate::error::ApiError;
use crate::store::CredentialStore;

/// Owner of the authentication state.
#[derive(Clone)]
pub struct SessionController {
    public: PublicClient,
    store: Arc<dyn CredentialStore>,
    state: AuthStateHandle,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state.current())
            .finish_non_exhaustive()
    }
}

impl SessionController {
    #[must_use]
    pub const fn new(
        public: PublicClient,
        store: Arc<dyn CredentialStore>,
        state: AuthStateHandle,
    ) -> Self {
        Self {
            public,
            store,
            state,
        }
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.state.current()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// The shared state handle.
    #[must_use]
    pub const fn handle(&self) -> &AuthStateHandle {
        &self.state
    }

    /// Resolve the startup `Loading` state.
    ///
    /// Never fails: any validation problem leaves the state `Anonymous`.
    #[instrument(skip(self))]
    pub async fn start(&self) -> AuthState {
        self.state.set(AuthState::Loading);
        if let Err(e) = self.revalidate().await {
            warn!(error = %e, "Startup validation failed, continuing anonymously");
        }
        self.state.current()
    }

    /// Ask the server who is logged in and update the state to match.
    ///
    /// "Not logged in" is a normal answer and resolves to `Anonymous` with
    /// `Ok(())`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Network` if the server could not be reached; the
    /// state is `Anonymous` in that case too.
    #[instrument(skip(self))]
    pub async fn revalidate(&self) -> Result<(), ApiError> {
        match self.public.validate().await {
            Ok(Some(session)) => {
                info!(email = %session.email, "Session validated");
                self.state.set(AuthState::Authenticated(session));
                Ok(())
            }
            Ok(None) => {
                info!("No active session");
                self.state.set(AuthState::Anonymous);
                Ok(())
            }
            Err(e) => {
                self.state.set(AuthState::Anonymous);
                Err(e)
            }
        }
    }

    /// Log in, then validate to load the session record.
    ///
    /// # Errors
    ///
    /// - `ApiError::InvalidCredentials` for an unknown email or wrong password
    /// - `ApiError::Network` if the server could not be reached
    /// - `ApiError::SessionExpired` if the server accepted the login but does
    ///   not recognise the session afterwards
    /// - `ApiError::Store` if a returned credential cannot be stored
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(&self, email: &Email, password: &SecretString) -> Result<(), ApiError> {
        let payload = match self.public.login(email, password).await {
            Ok(payload) => payload,
            Err(e) => {
                if !self.state.current().is_authenticated() {
                    self.state.set(AuthState::Anonymous);
                }
                return Err(e);
            }
        };

        if let Some(credential) = payload.access_token
            && let Err(e) = self.store.set(credential)
        {
            error!(error = %e, "Failed to store access credential");
            self.state.set(AuthState::Anonymous);
            return Err(e.into());
        }

        self.revalidate().await?;

        if self.state.current().is_authenticated() {
            info!("Logged in");
            Ok(())
        } else {
            warn!("Login accepted but session did not validate");
            Err(ApiError::SessionExpired)
        }
    }

    /// Log out.
    ///
    /// The server call is best-effort. The credential and the session cookie
    /// are always dropped locally.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Store` only if the stored credential could not be
    /// removed. The state is `Anonymous` regardless.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), ApiError> {
        if let Err(e) = self.public.logout().await {
            warn!(error = %e, "Server logout failed, clearing local session anyway");
        }
        self.public.forget_session();

        let cleared = self.store.clear();
        self.state.set(AuthState::Anonymous);
        info!("Logged out");

        cleared.map_err(|e| {
            error!(error = %e, "Failed to clear credential on logout");
            ApiError::Store(e)
        })
    }

    /// Register a new account. Does not log in.
    ///
    /// # Errors
    ///
    /// See [`PublicClient::register`].
    pub async fn register(&self, registration: &Registration) -> Result<RegistrationResult, ApiError> {
        self.public.register(registration).await
    }

    /// The logged-in user, if any.
    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.state.current().session().cloned()
    }
}
