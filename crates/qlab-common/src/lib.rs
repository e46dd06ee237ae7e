//! # qlab-common
//!
//! Shared building blocks for the qlab client crates:
//!
//! - [`http_client::HttpClient`], a minimal transport abstraction with a
//!   `reqwest` implementation behind the `reqwest-client` feature.
//! - [`api`], typed JSON endpoint descriptions and a stateless call builder.
//! - [`error`], the client error taxonomy.
//! - [`storage`], durable string key-value storage for session fields.

#![warn(missing_docs)]
pub use smol_str;
pub use url;

/// Typed JSON API calls.
pub mod api;
pub mod error;
/// HTTP client abstraction used by qlab crates.
pub mod http_client;
/// Durable key-value storage.
pub mod storage;

use smol_str::SmolStr;

/// Authorization token types for API requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationToken {
    /// Bearer token (the access token of the current session)
    Bearer(SmolStr),
}

impl AuthorizationToken {
    /// Render the token as an `Authorization` header value.
    pub fn header_value(&self) -> String {
        match self {
            AuthorizationToken::Bearer(t) => format!("Bearer {t}"),
        }
    }
}
