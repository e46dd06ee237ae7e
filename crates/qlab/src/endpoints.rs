//! Request and response schemas for the qlab backend.
//!
//! Each request type implements [`ApiRequest`], binding it to its path, method
//! and response schema. Response bodies are validated against these structs at
//! the boundary; unknown fields are ignored.

use chrono::{DateTime, Utc};
use qlab_common::api::{ApiMethod, ApiRequest};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::logging::LogLevel;

/// Exchange a username and password for an access/refresh token pair.
#[derive(Clone, Serialize, bon::Builder)]
#[builder(on(SmolStr, into))]
pub struct ObtainToken {
    /// Account name
    pub username: SmolStr,
    /// Account password
    pub password: SmolStr,
}

impl std::fmt::Debug for ObtainToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObtainToken")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Output of [`ObtainToken`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenPair {
    /// Short-lived access token
    pub access: SmolStr,
    /// Longer-lived refresh token
    pub refresh: SmolStr,
}

impl ApiRequest for ObtainToken {
    const PATH: &'static str = "/api/token/";
    const METHOD: ApiMethod = ApiMethod::Post;
    type Output = TokenPair;
}

/// Exchange a refresh token for a new access token.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshToken {
    /// The stored refresh token
    pub refresh: SmolStr,
}

/// Output of [`RefreshToken`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccessToken {
    /// The new access token
    pub access: SmolStr,
}

impl ApiRequest for RefreshToken {
    const PATH: &'static str = "/api/token/refresh/";
    const METHOD: ApiMethod = ApiMethod::Post;
    type Output = AccessToken;
}

/// Create a new account.
#[derive(Clone, Serialize, bon::Builder)]
#[builder(on(SmolStr, into))]
pub struct Registration {
    /// Account name
    pub username: SmolStr,
    /// Account password
    pub password: SmolStr,
    /// Given name
    pub first_name: SmolStr,
    /// Family name
    pub last_name: SmolStr,
    /// Contact address
    pub email: SmolStr,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .finish()
    }
}

/// Output of [`Registration`]: the created account, without its password.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegisteredUser {
    /// Account name
    pub username: SmolStr,
    /// Contact address
    #[serde(default)]
    pub email: SmolStr,
    /// Given name
    #[serde(default)]
    pub first_name: SmolStr,
    /// Family name
    #[serde(default)]
    pub last_name: SmolStr,
}

impl ApiRequest for Registration {
    const PATH: &'static str = "/api/register/";
    const METHOD: ApiMethod = ApiMethod::Post;
    type Output = RegisteredUser;
}

/// Fetch the authenticated user's profile.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct GetProfile;

/// Output of [`GetProfile`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Account name
    pub username: SmolStr,
    /// Given name
    pub first_name: SmolStr,
    /// Family name
    pub last_name: SmolStr,
    /// Contact address
    pub email: SmolStr,
}

impl ApiRequest for GetProfile {
    const PATH: &'static str = "/api/profile/";
    const METHOD: ApiMethod = ApiMethod::Get;
    type Output = Profile;
}

/// Replace the editable profile fields. Also the output of the update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[builder(on(SmolStr, into))]
pub struct UpdateProfile {
    /// Given name
    pub first_name: SmolStr,
    /// Family name
    pub last_name: SmolStr,
    /// Contact address
    pub email: SmolStr,
}

impl ApiRequest for UpdateProfile {
    const PATH: &'static str = "/api/profile/update/";
    const METHOD: ApiMethod = ApiMethod::Put;
    type Output = UpdateProfile;
}

/// Change the authenticated user's password.
#[derive(Clone, Serialize)]
pub struct ChangePassword {
    /// Current password
    pub old_password: SmolStr,
    /// Replacement password
    pub new_password: SmolStr,
}

impl std::fmt::Debug for ChangePassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ChangePassword { .. }")
    }
}

/// Output of [`ChangePassword`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PasswordChanged {
    /// Human-readable confirmation
    #[serde(default)]
    pub detail: Option<String>,
}

impl ApiRequest for ChangePassword {
    const PATH: &'static str = "/api/password/change/";
    const METHOD: ApiMethod = ApiMethod::Post;
    type Output = PasswordChanged;
}

/// A log record shipped to the backend's log collector.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    /// Severity
    pub level: LogLevel,
    /// Message text
    pub message: String,
    /// Structured context; always a JSON object
    pub meta: serde_json::Map<String, serde_json::Value>,
    /// Time the record was produced
    pub timestamp: DateTime<Utc>,
}

/// Output of [`LogEntry`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LogAccepted {
    /// `"logged"` on success
    #[serde(default)]
    pub status: Option<String>,
}

impl ApiRequest for LogEntry {
    const PATH: &'static str = "/api/logs/";
    const METHOD: ApiMethod = ApiMethod::Post;
    type Output = LogAccepted;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_builder_and_body() {
        let reg = Registration::builder()
            .username("bob")
            .password("hunter2")
            .first_name("Bob")
            .last_name("Builder")
            .email("bob@example.com")
            .build();
        let body: serde_json::Value = serde_json::from_slice(&reg.encode_body().unwrap()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "username": "bob",
                "password": "hunter2",
                "first_name": "Bob",
                "last_name": "Builder",
                "email": "bob@example.com",
            })
        );
        assert!(!format!("{reg:?}").contains("hunter2"));
    }

    #[test]
    fn log_entry_uses_backend_level_names() {
        let entry = LogEntry {
            level: LogLevel::Warning,
            message: "disk almost full".into(),
            meta: serde_json::Map::new(),
            timestamp: DateTime::parse_from_rfc3339("2025-01-02T03:04:05Z")
                .unwrap()
                .with_timezone(&Utc),
        };
        let body: serde_json::Value = serde_json::from_slice(&entry.encode_body().unwrap()).unwrap();
        assert_eq!(body["level"], "WARNING");
        assert_eq!(body["meta"], serde_json::json!({}));
        assert_eq!(body["timestamp"], "2025-01-02T03:04:05Z");
    }

    #[test]
    fn refresh_output_ignores_extra_fields() {
        let out: AccessToken =
            serde_json::from_str(r#"{"access":"A2","refresh":"R2"}"#).unwrap();
        assert_eq!(out.access, "A2");
    }
}
