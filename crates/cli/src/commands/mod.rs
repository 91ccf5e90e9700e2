//! CLI command implementations.

pub mod auth;
pub mod products;

use std::io::BufRead;

use secrecy::SecretString;
use stockwatch_client::{ApiError, AppState, Navigation, Route, gate};
use stockwatch_core::{EmailError, RegistrationError};
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// API or session failure.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Invalid email address.
    #[error("Invalid email: {0}")]
    Email(#[from] EmailError),

    /// Registration form rejected before sending.
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// Reading input or writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No password in the environment or on stdin.
    #[error("No password given: set {0} or pipe it on stdin")]
    MissingPassword(&'static str),

    /// A protected command was run without a session.
    #[error("Not logged in. Run `stockwatch login -e <email>` first.")]
    NotLoggedIn,
}

/// Read a secret from `env_value`, or else the next line of `input`.
///
/// Only the line terminator is stripped; surrounding spaces are part of the
/// password.
pub fn read_secret(
    env_key: &'static str,
    env_value: Option<String>,
    input: &mut impl BufRead,
) -> Result<SecretString, CommandError> {
    if let Some(value) = env_value.filter(|v| !v.is_empty()) {
        return Ok(SecretString::from(value));
    }

    let mut line = String::new();
    input.read_line(&mut line)?;
    let secret = line.trim_end_matches(['\r', '\n']);
    if secret.is_empty() {
        return Err(CommandError::MissingPassword(env_key));
    }
    Ok(SecretString::from(secret.to_owned()))
}

/// Resolve the startup state and require an authenticated session.
pub async fn require_session(state: &AppState) -> Result<(), CommandError> {
    let auth = state.session().start().await;
    match gate(&auth, Route::Dashboard) {
        Navigation::Render(_) => Ok(()),
        Navigation::Redirect(_) | Navigation::ShowLoading => Err(CommandError::NotLoggedIn),
    }
}
