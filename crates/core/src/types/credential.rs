//! Bearer credential type.
//!
//! The access credential is an opaque token issued by the API on login or
//! reissue. Its contents are never inspected client-side.

use core::fmt;

use secrecy::{ExposeSecret, SecretString};

/// Opaque bearer token used to authorize API calls.
///
/// Wraps a [`SecretString`] so the token never shows up in `Debug` output or
/// tracing fields. Use [`Credential::expose`] only at the point where the
/// token is written into an `Authorization` header or persisted.
#[derive(Clone)]
pub struct Credential(SecretString);

impl Credential {
    /// Create a credential from the raw token string.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// Get the raw token.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Returns `true` if the token is empty or whitespace only.
    ///
    /// The API never issues such tokens; callers treat them as "no credential".
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.expose().trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for Credential {}

impl From<String> for Credential {
    fn from(token: String) -> Self {
        Self::new(token)
    }
}

impl From<&str> for Credential {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}
