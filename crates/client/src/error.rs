//! Error types for the Stockwatch client.

use reqwest::StatusCode;
use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by the API clients and the session controller.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Login rejected: unknown email or wrong password.
    #[error("Invalid credentials. Please try again.")]
    InvalidCredentials,

    /// The server rejected a payload (e.g. duplicate email on registration).
    #[error("{0}")]
    Validation(String),

    /// The credential could not be renewed; the user must log in again.
    #[error("Session expired. Please log in again.")]
    SessionExpired,

    /// The reissue endpoint refused to issue a new credential.
    #[error("Credential reissue denied")]
    RefreshDenied,

    /// No response was received (connect failure, timeout, CORS-style abort).
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with a status this operation does not expect.
    #[error("Unexpected server response: HTTP {0}")]
    UnknownServer(StatusCode),

    /// The response body could not be decoded.
    #[error("Invalid response body: {0}")]
    Decode(String),

    /// The credential store failed.
    #[error("Credential store error: {0}")]
    Store(#[from] StoreError),

    /// A request path could not be joined onto the API base URL.
    #[error("Invalid request URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// Classify a `reqwest` error raised while sending or reading a response.
    pub(crate) fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }

    /// Returns `true` if the error ends the current session.
    #[must_use]
    pub const fn ends_session(&self) -> bool {
        matches!(self, Self::SessionExpired | Self::RefreshDenied | Self::Store(_))
    }
}

/// Failure of a credential reissue.
///
/// Cloneable so one outcome can be handed to every caller waiting on the same
/// in-flight reissue.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RefreshError {
    /// The server refused to reissue (session expired or revoked).
    #[error("reissue denied by server (HTTP {0})")]
    Denied(u16),

    /// No response from the reissue endpoint.
    #[error("reissue request failed: {0}")]
    Network(String),

    /// The server answered 2xx without a usable token.
    #[error("reissue response malformed: {0}")]
    Malformed(String),

    /// The new credential could not be stored.
    #[error("could not store reissued credential: {0}")]
    Store(String),
}

impl From<RefreshError> for ApiError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::Denied(_) | RefreshError::Malformed(_) => Self::RefreshDenied,
            RefreshError::Network(message) => Self::Network(message),
            RefreshError::Store(message) => Self::Store(StoreError::Backend(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            ApiError::InvalidCredentials.to_string(),
            "Invalid credentials. Please try again."
        );
        assert_eq!(
            ApiError::Validation("Email already registered".to_string()).to_string(),
            "Email already registered"
        );
        assert_eq!(
            ApiError::UnknownServer(StatusCode::BAD_GATEWAY).to_string(),
            "Unexpected server response: HTTP 502 Bad Gateway"
        );
    }

    #[test]
    fn test_refresh_error_maps_to_api_error() {
        assert!(matches!(
            ApiError::from(RefreshError::Denied(401)),
            ApiError::RefreshDenied
        ));
        assert!(matches!(
            ApiError::from(RefreshError::Malformed("no token".to_string())),
            ApiError::RefreshDenied
        ));
        assert!(matches!(
            ApiError::from(RefreshError::Network("refused".to_string())),
            ApiError::Network(_)
        ));
    }

    #[test]
    fn test_ends_session() {
        assert!(ApiError::SessionExpired.ends_session());
        assert!(ApiError::RefreshDenied.ends_session());
        assert!(!ApiError::InvalidCredentials.ends_session());
        assert!(!ApiError::Network("timeout".to_string()).ends_session());
    }
}
