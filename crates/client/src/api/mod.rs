//! API clients.
//!
//! - [`PublicClient`] - login, registration, validation, logout, reissue
//! - [`AuthenticatedClient`] - bearer-authenticated calls with refresh-once retry
//! - [`RefreshCoordinator`] - single-flight credential reissue
//! - [`ProductsApi`] - inventory endpoints

mod authenticated;
mod products;
mod public;
mod refresh;

pub use authenticated::{AuthenticatedClient, PendingRequest};
pub use products::{Dashboard, ProductsApi};
pub use public::{PublicClient, RegistrationResult, SessionPayload};
pub use refresh::{CredentialIssuer, RefreshCoordinator};
