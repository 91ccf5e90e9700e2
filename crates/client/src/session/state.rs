//! Observable authentication state.

use std::sync::Arc;

use stockwatch_core::Session;
use tokio::sync::watch;
use tracing::info;

/// Where the session lifecycle currently stands.
///
/// The session travels inside the `Authenticated` variant, so the state can
/// never claim a user without carrying one, and `Anonymous` never carries one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    /// Startup validation has not finished yet.
    #[default]
    Loading,
    /// The server confirmed an active session.
    Authenticated(Session),
    /// No session. Protected views redirect to login.
    Anonymous,
}

impl AuthState {
    /// The current user, if authenticated.
    #[must_use]
    pub const fn session(&self) -> Option<&Session> {
        match self {
            Self::Authenticated(session) => Some(session),
            Self::Loading | Self::Anonymous => None,
        }
    }

    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

impl From<Option<Session>> for AuthState {
    fn from(session: Option<Session>) -> Self {
        session.map_or(Self::Anonymous, Self::Authenticated)
    }
}

/// Shared, observable holder of the [`AuthState`].
///
/// Held by both the session controller and the authenticated client, so an
/// expired credential discovered mid-request flips the whole app to
/// `Anonymous`.
#[derive(Debug, Clone)]
pub struct AuthStateHandle {
    tx: Arc<watch::Sender<AuthState>>,
}

impl Default for AuthStateHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthStateHandle {
    /// Create a handle starting in `Loading`.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(AuthState::Loading);
        Self { tx: Arc::new(tx) }
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn current(&self) -> AuthState {
        self.tx.borrow().clone()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.tx.subscribe()
    }

    /// Replace the state, notifying subscribers only when it changes.
    pub fn set(&self, state: AuthState) {
        self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    /// Drop the session after the credential could not be renewed.
    pub fn expire(&self) {
        if self.current().is_authenticated() {
            info!("Session expired, returning to login");
        }
        self.set(AuthState::Anonymous);
    }
}
