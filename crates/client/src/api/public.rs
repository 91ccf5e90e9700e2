//! Unauthenticated API calls.
//!
//! Login, registration, validation, logout and credential reissue. None of
//! these attach a bearer credential: login and registration carry explicit
//! fields, the rest rely on the session cookie held by the shared cookie jar.

use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use stockwatch_core::{Credential, Email, Registration, Session};
use tracing::{debug, instrument, warn};

use super::refresh::CredentialIssuer;
use crate::error::{ApiError, RefreshError};
use crate::http::HttpContext;

const LOGIN_PATH: &str = "users/login";
const REGISTER_PATH: &str = "users/register";
const VALIDATE_PATH: &str = "users/validate";
const LOGOUT_PATH: &str = "users/logout";
const REISSUE_PATH: &str = "users/reissue";

/// Successful login payload.
#[derive(Debug, Clone)]
pub struct SessionPayload {
    /// User record, when the server includes one.
    pub user: Option<Session>,
    /// Bearer credential, when the server returns one in the body.
    pub access_token: Option<Credential>,
    /// Server message.
    pub message: Option<String>,
}

/// Successful registration result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationResult {
    /// Server message (e.g. "User added successfully").
    pub message: Option<String>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    email: &'a str,
    password: &'a str,
    first_name: &'a str,
    last_name: &'a str,
    phone: &'a str,
}

/// Envelope shared by the `users/*` endpoints.
#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    user: Option<serde_json::Value>,
    #[serde(default, alias = "accessToken")]
    access_token: Option<String>,
}

impl Envelope {
    /// Decode the user object, treating anything without an email as absent.
    fn session(&self) -> Option<Session> {
        let user = self.user.clone()?;
        match serde_json::from_value::<Session>(user) {
            Ok(session) => Some(session),
            Err(e) => {
                debug!(error = %e, "User payload is not a usable session");
                None
            }
        }
    }

    fn access_token(&self) -> Option<Credential> {
        self.access_token
            .as_deref()
            .map(Credential::new)
            .filter(|credential| !credential.is_blank())
    }
}

#[derive(Debug, Deserialize)]
struct ReissueResponse {
    #[serde(default, rename = "accessToken", alias = "access_token")]
    access_token: Option<String>,
}

/// Client for the calls that need no bearer credential.
#[derive(Clone, Debug)]
pub struct PublicClient {
    http: HttpContext,
    timeout: Duration,
}

impl PublicClient {
    /// Create a client over the shared HTTP context.
    #[must_use]
    pub const fn new(http: HttpContext, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    /// Log in with email and password.
    ///
    /// On success the server sets the session cookie; it may also return a
    /// bearer credential in the body.
    ///
    /// # Errors
    ///
    /// - `ApiError::InvalidCredentials` if the server reports failure
    /// - `ApiError::Network` if no response was received
    /// - `ApiError::UnknownServer` for unexpected statuses
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<SessionPayload, ApiError> {
        let response = self
            .http
            .client()
            .post(self.http.url(LOGIN_PATH)?)
            .timeout(self.timeout)
            .json(&LoginRequest {
                email: email.as_str(),
                password: password.expose_secret(),
            })
            .send()
            .await
            .map_err(|e| ApiError::from_transport(&e))?;

        let status = response.status();

        if status.is_success() {
            let envelope: Envelope = response
                .json()
                .await
                .map_err(|e| ApiError::from_transport(&e))?;

            if envelope.success != Some(true) {
                warn!(message = ?envelope.message, "Login failed");
                return Err(ApiError::InvalidCredentials);
            }

            debug!("Login accepted");
            return Ok(SessionPayload {
                user: envelope.session(),
                access_token: envelope.access_token(),
                message: envelope.message,
            });
        }

        let envelope = read_envelope(response).await;
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                warn!(%status, message = ?envelope.message, "Login rejected");
                Err(ApiError::InvalidCredentials)
            }
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => Err(ApiError::Validation(
                envelope
                    .message
                    .unwrap_or_else(|| "Invalid login request".to_string()),
            )),
            _ => Err(ApiError::UnknownServer(status)),
        }
    }

    /// Register a new account.
    ///
    /// # Errors
    ///
    /// - `ApiError::Validation` with the server's message if the payload is
    ///   rejected (e.g. duplicate email)
    /// - `ApiError::Network` if no response was received
    /// - `ApiError::UnknownServer` for server errors
    #[instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register(
        &self,
        registration: &Registration,
    ) -> Result<RegistrationResult, ApiError> {
        let response = self
            .http
            .client()
            .post(self.http.url(REGISTER_PATH)?)
            .timeout(self.timeout)
            .json(&RegisterRequest {
                email: registration.email.as_str(),
                password: registration.password.expose_secret(),
                first_name: &registration.first_name,
                last_name: &registration.last_name,
                phone: &registration.phone,
            })
            .send()
            .await
            .map_err(|e| ApiError::from_transport(&e))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ApiError::UnknownServer(status));
        }

        let envelope = read_envelope(response).await;

        if status.is_success() && envelope.success != Some(false) {
            debug!("Registration accepted");
            return Ok(RegistrationResult {
                message: envelope.message,
            });
        }

        let message = envelope
            .message
            .unwrap_or_else(|| "Registration failed".to_string());
        warn!(%status, %message, "Registration rejected");
        Err(ApiError::Validation(message))
    }

    /// Ask the server whether the session cookie identifies a user.
    ///
    /// "Not logged in" is the normal state for anonymous visitors and is
    /// returned as `Ok(None)`, including non-2xx answers and bodies that do
    /// not carry a user with an email.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Network` only when no response was received.
    #[instrument(skip(self))]
    pub async fn validate(&self) -> Result<Option<Session>, ApiError> {
        let response = self
            .http
            .client()
            .get(self.http.url(VALIDATE_PATH)?)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            debug!(%status, "No active session");
            return Ok(None);
        }

        let envelope = read_envelope(response).await;
        if envelope.success != Some(true) {
            debug!(message = ?envelope.message, "Validation reported no session");
            return Ok(None);
        }

        Ok(envelope.session())
    }

    /// End the server-side session.
    ///
    /// # Errors
    ///
    /// - `ApiError::Network` if no response was received
    /// - `ApiError::UnknownServer` if the server did not confirm the logout
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), ApiError> {
        let response = self
            .http
            .client()
            .post(self.http.url(LOGOUT_PATH)?)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ApiError::from_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::UnknownServer(status));
        }

        let envelope = read_envelope(response).await;
        if envelope.success == Some(false) {
            return Err(ApiError::UnknownServer(status));
        }
        Ok(())
    }

    /// Drop the session cookie locally, whether or not the server ended it.
    pub fn forget_session(&self) {
        self.http.clear_session_cookies();
    }

    /// Exchange the session cookie for a new bearer credential.
    ///
    /// Never sends the (expired) bearer credential.
    ///
    /// # Errors
    ///
    /// - `RefreshError::Denied` if the server refuses
    /// - `RefreshError::Network` if no response was received
    /// - `RefreshError::Malformed` if a 2xx response carries no token
    #[instrument(skip(self))]
    pub async fn reissue(&self) -> Result<Credential, RefreshError> {
        let response = self
            .http
            .client()
            .post(
                self.http
                    .url(REISSUE_PATH)
                    .map_err(|e| RefreshError::Malformed(e.to_string()))?,
            )
            .timeout(self.timeout)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| RefreshError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "Credential reissue denied");
            return Err(RefreshError::Denied(status.as_u16()));
        }

        let body: ReissueResponse = response
            .json()
            .await
            .map_err(|e| RefreshError::Malformed(e.to_string()))?;

        let credential = body
            .access_token
            .map(Credential::new)
            .filter(|credential| !credential.is_blank())
            .ok_or_else(|| RefreshError::Malformed("response has no accessToken".to_string()))?;

        debug!("Credential reissued");
        Ok(credential)
    }
}

impl CredentialIssuer for PublicClient {
    fn issue(&self) -> BoxFuture<'static, Result<Credential, RefreshError>> {
        let client = self.clone();
        async move { client.reissue().await }.boxed()
    }
}

/// Read a JSON envelope, falling back to an empty one for bodies that are
/// missing or not JSON (error pages, empty 204s).
async fn read_envelope(response: reqwest::Response) -> Envelope {
    match response.bytes().await {
        Ok(bytes) if !bytes.is_empty() => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            debug!(error = %e, "Response body is not a JSON envelope");
            Envelope::default()
        }),
        _ => Envelope::default(),
    }
}
