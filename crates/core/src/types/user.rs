//! Authenticated user and registration types.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::email::{Email, EmailError};
use super::id::UserId;

/// Role of a store user.
///
/// The server stores roles as free text, so names outside the known set are
/// kept verbatim in `Other`. Known names match case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum UserRole {
    Associate,
    Manager,
    #[default]
    Customer,
    Other(String),
}

impl UserRole {
    /// Wire name of the role.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Associate => "associate",
            Self::Manager => "manager",
            Self::Customer => "customer",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for UserRole {
    fn from(name: String) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "associate" => Self::Associate,
            "manager" => Self::Manager,
            "customer" => Self::Customer,
            _ => Self::Other(name),
        }
    }
}

impl From<UserRole> for String {
    fn from(role: UserRole) -> Self {
        match role {
            UserRole::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server-confirmed identity of the current user.
///
/// Always rebuilt from a validate response, never patched field by field.
/// The API has used both snake_case and camelCase for these fields, so both
/// are accepted. Only `email` is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// User ID (absent on some validate payloads).
    #[serde(default)]
    pub id: Option<UserId>,
    /// Given name.
    #[serde(default, alias = "firstName")]
    pub first_name: String,
    /// Family name.
    #[serde(default, alias = "lastName")]
    pub last_name: String,
    /// Login email.
    pub email: Email,
    /// Contact phone number.
    #[serde(default)]
    pub phone: String,
    /// Store role.
    #[serde(default)]
    pub role: UserRole,
    /// Account creation time as sent by the server.
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<String>,
}

impl Session {
    /// Name to greet the user with.
    ///
    /// Falls back to the email when the server sent no name.
    #[must_use]
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let name = name.trim();
        if name.is_empty() {
            self.email.to_string()
        } else {
            name.to_string()
        }
    }

    /// Parse `created_at`, accepting RFC 3339 and the RFC 2822 form Flask emits.
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.created_at.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .or_else(|_| DateTime::parse_from_rfc2822(raw))
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Errors raised while validating a registration form.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("Passwords do not match.")]
    PasswordMismatch,
    #[error("Password is required")]
    MissingPassword,
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),
}

/// Raw registration form input.
#[derive(Debug)]
pub struct RegistrationForm {
    pub email: String,
    pub password: SecretString,
    pub confirm_password: SecretString,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

impl RegistrationForm {
    /// Validate the form into a [`Registration`].
    ///
    /// Whitespace is stripped from the email the same way the form field does
    /// while typing. Names and phone are trimmed.
    ///
    /// # Errors
    ///
    /// Returns the first problem found, checking passwords before fields.
    pub fn validate(self) -> Result<Registration, RegistrationError> {
        if self.password.expose_secret() != self.confirm_password.expose_secret() {
            return Err(RegistrationError::PasswordMismatch);
        }
        if self.password.expose_secret().is_empty() {
            return Err(RegistrationError::MissingPassword);
        }

        let first_name = required(&self.first_name, "First name")?;
        let last_name = required(&self.last_name, "Last name")?;
        let phone = required(&self.phone, "Phone number")?;

        let email: String = self.email.chars().filter(|c| !c.is_whitespace()).collect();
        let email = Email::parse(&email)?;

        Ok(Registration {
            email,
            password: self.password,
            first_name,
            last_name,
            phone,
        })
    }
}

fn required(value: &str, field: &'static str) -> Result<String, RegistrationError> {
    let value = value.trim();
    if value.is_empty() {
        Err(RegistrationError::MissingField(field))
    } else {
        Ok(value.to_string())
    }
}

/// A validated registration, ready to submit.
#[derive(Debug)]
pub struct Registration {
    pub email: Email,
    pub password: SecretString,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form() -> RegistrationForm {
        RegistrationForm {
            email: " jane@store.example ".to_string(),
            password: SecretString::from("hunter22"),
            confirm_password: SecretString::from("hunter22"),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            phone: "555-0100".to_string(),
        }
    }

    #[test]
    fn test_session_accepts_camel_case() {
        let json = r#"{
            "id": 3,
            "firstName": "Jane",
            "lastName": "Doe",
            "email": "jane@store.example",
            "phone": "555-0100",
            "role": "manager",
            "createdAt": "2025-03-01T12:00:00Z"
        }"#;
        let session: Session = serde_json::from_str(json).unwrap();

        assert_eq!(session.id, Some(UserId::new(3)));
        assert_eq!(session.role, UserRole::Manager);
        assert_eq!(session.display_name(), "Jane Doe");
        assert!(session.created_at().is_some());
    }

    #[test]
    fn test_session_with_only_email() {
        let session: Session =
            serde_json::from_str(r#"{"email":"jane@store.example"}"#).unwrap();

        assert_eq!(session.role, UserRole::Customer);
        assert_eq!(session.display_name(), "jane@store.example");
        assert!(session.created_at().is_none());
    }

    #[test]
    fn test_session_rfc2822_created_at() {
        let session: Session = serde_json::from_str(
            r#"{"email":"a@b.c","created_at":"Sat, 01 Mar 2025 12:00:00 GMT"}"#,
        )
        .unwrap();
        assert!(session.created_at().is_some());
    }

    #[test]
    fn test_session_keeps_unknown_role() {
        let session: Session =
            serde_json::from_str(r#"{"email":"a@b.c","role":"admin"}"#).unwrap();
        assert_eq!(session.role, UserRole::Other("admin".to_string()));
        assert_eq!(session.role.to_string(), "admin");
        assert_eq!(serde_json::to_value(&session.role).unwrap(), "admin");
    }

    #[test]
    fn test_role_names_match_case_insensitively() {
        let session: Session =
            serde_json::from_str(r#"{"email":"a@b.c","role":"Manager"}"#).unwrap();
        assert_eq!(session.role, UserRole::Manager);
        assert_eq!(session.role.to_string(), "manager");
    }

    #[test]
    fn test_session_requires_email() {
        assert!(serde_json::from_str::<Session>(r#"{"id":1}"#).is_err());
    }

    #[test]
    fn test_registration_validates() {
        let registration = form().validate().unwrap();
        assert_eq!(registration.email.as_str(), "jane@store.example");
        assert_eq!(registration.first_name, "Jane");
    }

    #[test]
    fn test_registration_password_mismatch() {
        let mut form = form();
        form.confirm_password = SecretString::from("other");
        assert_eq!(form.validate().unwrap_err(), RegistrationError::PasswordMismatch);
    }

    #[test]
    fn test_registration_missing_field() {
        let mut form = form();
        form.phone = "  ".to_string();
        assert_eq!(
            form.validate().unwrap_err().to_string(),
            "Phone number is required"
        );
    }

    #[test]
    fn test_registration_bad_email() {
        let mut form = form();
        form.email = "not-an-email".to_string();
        assert!(matches!(
            form.validate(),
            Err(RegistrationError::InvalidEmail(EmailError::AtSymbol))
        ));
    }
}
