//! Session commands.
//!
//! # Environment Variables
//!
//! - `STOCKWATCH_PASSWORD` - Password for `login` and `register`
//! - `STOCKWATCH_PASSWORD_CONFIRM` - Confirmation for `register`
//!
//! When unset, each is read as one line from stdin, in that order.

use std::io::Write;

use stockwatch_client::{AppState, AuthState};
use stockwatch_core::{Email, RegistrationForm};

use super::{CommandError, read_secret};

const PASSWORD_VAR: &str = "STOCKWATCH_PASSWORD";
const CONFIRM_VAR: &str = "STOCKWATCH_PASSWORD_CONFIRM";

/// Log in and show who the server says we are.
pub async fn login(state: &AppState, email: &str) -> Result<(), CommandError> {
    let email = Email::parse(email.trim())?;
    let password = read_secret(
        PASSWORD_VAR,
        std::env::var(PASSWORD_VAR).ok(),
        &mut std::io::stdin().lock(),
    )?;

    state.session().login(&email, &password).await?;

    let mut out = std::io::stdout().lock();
    match state.session().session() {
        Some(session) => writeln!(out, "Logged in as {} ({})", session.display_name(), session.email)?,
        None => writeln!(out, "Logged in")?,
    }
    Ok(())
}

/// Log out. Local state is cleared even if the server is unreachable.
pub async fn logout(state: &AppState) -> Result<(), CommandError> {
    state.session().logout().await?;
    writeln!(std::io::stdout().lock(), "Logged out.")?;
    Ok(())
}

/// Register a new account.
pub async fn register(
    state: &AppState,
    email: String,
    first_name: String,
    last_name: String,
    phone: String,
) -> Result<(), CommandError> {
    let (password, confirm_password) = {
        let mut stdin = std::io::stdin().lock();
        (
            read_secret(PASSWORD_VAR, std::env::var(PASSWORD_VAR).ok(), &mut stdin)?,
            read_secret(CONFIRM_VAR, std::env::var(CONFIRM_VAR).ok(), &mut stdin)?,
        )
    };

    let registration = RegistrationForm {
        email,
        password,
        confirm_password,
        first_name,
        last_name,
        phone,
    }
    .validate()?;

    let result = state.session().register(&registration).await?;

    let mut out = std::io::stdout().lock();
    writeln!(
        out,
        "{}",
        result
            .message
            .as_deref()
            .unwrap_or("Registration successful.")
    )?;
    writeln!(out, "You can now log in with `stockwatch login -e {}`.", registration.email)?;
    Ok(())
}

/// Show the logged-in user.
pub async fn whoami(state: &AppState) -> Result<(), CommandError> {
    let auth = state.session().start().await;

    let mut out = std::io::stdout().lock();
    match auth {
        AuthState::Authenticated(session) => {
            writeln!(out, "Name:  {}", session.display_name())?;
            writeln!(out, "Email: {}", session.email)?;
            if !session.phone.is_empty() {
                writeln!(out, "Phone: {}", session.phone)?;
            }
            writeln!(out, "Role:  {}", session.role)?;
            if let Some(created) = session.created_at() {
                writeln!(out, "Since: {}", created.format("%Y-%m-%d"))?;
            }
        }
        AuthState::Anonymous | AuthState::Loading => writeln!(out, "Not logged in")?,
    }
    Ok(())
}
