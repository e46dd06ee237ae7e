//! Error types for API client operations

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::storage::StorageError;

/// Client error type wrapping all possible error conditions
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ClientError {
    /// HTTP transport error
    #[error("HTTP transport error: {0}")]
    Transport(
        #[from]
        #[diagnostic_source]
        TransportError,
    ),

    /// Request serialization failed
    #[error("{0}")]
    Encode(
        #[from]
        #[diagnostic_source]
        EncodeError,
    ),

    /// Response deserialization failed
    #[error("{0}")]
    Decode(
        #[from]
        #[diagnostic_source]
        DecodeError,
    ),

    /// HTTP error response
    #[error("{0}")]
    Http(
        #[from]
        #[diagnostic_source]
        HttpError,
    ),

    /// The endpoint rejected the submitted fields
    #[error("Validation failed: {0}")]
    Validation(
        #[from]
        #[diagnostic_source]
        ValidationError,
    ),

    /// Authentication error
    #[error("Authentication error: {0}")]
    Auth(
        #[from]
        #[diagnostic_source]
        AuthError,
    ),

    /// Persisting session state failed
    #[error("Session storage error: {0}")]
    Storage(
        #[from]
        #[diagnostic_source]
        StorageError,
    ),
}

impl ClientError {
    /// True when the server answered `401 Unauthorized`.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Auth(AuthError::Unauthorized(_)))
    }
}

/// Transport-level errors that occur during HTTP communication
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum TransportError {
    /// Failed to establish connection to server
    #[error("Connection error: {0}")]
    Connect(String),

    /// Request timed out
    #[error("Request timeout")]
    Timeout,

    /// Request construction failed (malformed URI, headers, etc.)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Other transport error
    #[error("Transport error: {0}")]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl TransportError {
    /// Classify an error returned by an [`HttpClient`](crate::http_client::HttpClient).
    ///
    /// `reqwest` errors are mapped onto the specific variants; anything else
    /// becomes [`TransportError::Other`].
    pub fn from_client_error<E>(e: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(e);
        #[cfg(feature = "reqwest-client")]
        let boxed = match boxed.downcast::<reqwest::Error>() {
            Ok(e) => return Self::from(*e),
            Err(other) => other,
        };
        Self::Other(boxed)
    }
}

/// Request serialization errors
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum EncodeError {
    /// JSON serialization failed
    #[error("Failed to serialize JSON: {0}")]
    Json(
        #[from]
        #[source]
        serde_json::Error,
    ),
}

/// Response deserialization errors
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum DecodeError {
    /// JSON deserialization failed
    #[error("Failed to deserialize JSON: {0}")]
    Json(
        #[from]
        #[source]
        serde_json::Error,
    ),
}

/// HTTP error response (non-2xx status codes not mapped to a more specific error)
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub struct HttpError {
    /// HTTP status code
    pub status: http::StatusCode,
    /// Response body if available
    pub body: Option<Bytes>,
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(body) = &self.body {
            if let Ok(s) = std::str::from_utf8(body) {
                write!(f, ":\n{}", s)?;
            }
        }
        Ok(())
    }
}

/// A `400 Bad Request` carrying per-field messages.
///
/// The backend answers rejected input with a JSON object mapping each field
/// to a list of messages, e.g. `{"username": ["A user with that username already exists."]}`.
/// Bodies that don't have that shape leave `fields` empty and keep the raw body.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub struct ValidationError {
    /// HTTP status code
    pub status: http::StatusCode,
    /// Messages keyed by the rejected field
    pub fields: BTreeMap<String, Vec<String>>,
    /// Response body if available
    pub body: Option<Bytes>,
}

impl ValidationError {
    /// Messages reported for a single field.
    pub fn field(&self, name: &str) -> &[String] {
        self.fields.get(name).map(Vec::as_slice).unwrap_or_default()
    }
}

impl From<HttpError> for ValidationError {
    fn from(err: HttpError) -> Self {
        let fields = err
            .body
            .as_ref()
            .and_then(|body| serde_json::from_slice::<serde_json::Map<String, serde_json::Value>>(body).ok())
            .map(|object| {
                object
                    .into_iter()
                    .map(|(field, value)| {
                        let messages = match value {
                            serde_json::Value::Array(items) => items
                                .into_iter()
                                .map(|item| match item {
                                    serde_json::Value::String(s) => s,
                                    other => other.to_string(),
                                })
                                .collect(),
                            serde_json::Value::String(s) => vec![s],
                            other => vec![other.to_string()],
                        };
                        (field, messages)
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self {
            status: err.status,
            fields,
            body: err.body,
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        for (field, messages) in &self.fields {
            write!(f, "\n  {}: {}", field, messages.join(" "))?;
        }
        Ok(())
    }
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(feature = "reqwest-client")]
impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Connect(e.to_string())
        } else if e.is_builder() || e.is_request() {
            Self::InvalidRequest(e.to_string())
        } else {
            Self::Other(Box::new(e))
        }
    }
}

/// Authentication and authorization errors
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum AuthError {
    /// The token endpoint rejected the username/password pair
    #[error("Invalid credentials: {0}")]
    #[diagnostic(help("check the username and password and try again"))]
    InvalidCredentials(HttpError),

    /// Refreshing the access token failed; the session has been cleared
    #[error("Session expired. Please log in again.")]
    SessionExpired,

    /// The server answered `401 Unauthorized`
    #[error("Unauthorized: {0}")]
    Unauthorized(HttpError),

    /// Request requires authentication but none was provided
    #[error("No authentication provided, but endpoint requires auth")]
    NotAuthenticated,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_collects_field_messages() {
        let err = ValidationError::from(HttpError {
            status: http::StatusCode::BAD_REQUEST,
            body: Some(Bytes::from_static(
                br#"{"username":["A user with that username already exists."],"current_password":"Current password is incorrect."}"#,
            )),
        });
        assert_eq!(
            err.field("username"),
            ["A user with that username already exists.".to_string()]
        );
        assert_eq!(
            err.field("current_password"),
            ["Current password is incorrect.".to_string()]
        );
        assert!(err.field("email").is_empty());
    }

    #[test]
    fn validation_error_tolerates_non_object_body() {
        let err = ValidationError::from(HttpError {
            status: http::StatusCode::BAD_REQUEST,
            body: Some(Bytes::from_static(b"bad request")),
        });
        assert!(err.fields.is_empty());
        assert_eq!(err.body.as_deref(), Some(&b"bad request"[..]));
    }

    #[test]
    fn unauthorized_is_detected() {
        let err: ClientError = AuthError::Unauthorized(HttpError {
            status: http::StatusCode::UNAUTHORIZED,
            body: None,
        })
        .into();
        assert!(err.is_unauthorized());
        let err: ClientError = AuthError::SessionExpired.into();
        assert!(!err.is_unauthorized());
    }
}
