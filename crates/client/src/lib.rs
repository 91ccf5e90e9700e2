//! Stockwatch Client - session lifecycle and credential-refreshing API access.
//!
//! # Architecture
//!
//! - [`store`] - Single-slot credential store (memory or per-origin file)
//! - [`api`] - Public calls, bearer-authenticated calls with one
//!   refresh-and-retry, single-flight credential refresh, inventory endpoints
//! - [`session`] - `Loading` / `Authenticated` / `Anonymous` state machine
//! - [`navigation`] - Route gating by session state
//! - [`scope`] - Discarding results for views that are gone
//! - [`state`] - Wiring everything over one HTTP client
//!
//! # Example
//!
//! ```no_run
//! use stockwatch_client::{AppState, ClientConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let state = AppState::from_config(ClientConfig::from_env()?)?;
//! state.session().start().await;
//! let dashboard = state.products().dashboard().await?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod error;
pub mod http;
pub mod navigation;
pub mod scope;
pub mod session;
pub mod state;
pub mod store;

pub use api::{
    AuthenticatedClient, CredentialIssuer, Dashboard, PendingRequest, ProductsApi, PublicClient,
    RefreshCoordinator, RegistrationResult, SessionPayload,
};
pub use config::{ClientConfig, ConfigError};
pub use error::{ApiError, RefreshError};
pub use navigation::{Navigation, Route, gate};
pub use scope::ViewScope;
pub use session::{AuthState, AuthStateHandle, SessionController};
pub use state::AppState;
pub use store::{
    CredentialStore, FileCredentialStore, MemoryCredentialStore, SessionCookieFile, StoreError,
};
