//! # qlab
//!
//! Client-side session management for the qlab web API.
//!
//! - [`client::ApiClient`] wraps an [`HttpClient`](qlab_common::http_client::HttpClient)
//!   with two interceptors: it attaches the current bearer token to every call and,
//!   on a `401`, refreshes the access token once and replays the call.
//! - [`client::session::AuthSession`] owns the access/refresh tokens and the
//!   profile fields, keeps them mirrored into durable storage and implements
//!   login, logout, refresh, registration, profile and password operations.
//! - [`ui`] holds small pieces of shared UI state.
//! - [`logging`] mirrors log records to the backend's `/api/logs/` endpoint.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use qlab::client::{ApiClient, session::AuthSession};
//! use qlab::storage::FileStore;
//!
//! # #[tokio::main]
//! # async fn main() -> miette::Result<()> {
//! let base = url::Url::parse("http://localhost:8000").unwrap();
//! let client = Arc::new(ApiClient::new(reqwest::Client::new(), base));
//! let store = Arc::new(FileStore::new("./.qlab/session.json"));
//!
//! let session = AuthSession::load(store, client).await;
//! session.login("alice", "pw").await?;
//! println!("hello {:?}", session.snapshot().await.first_name);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

/// Typed endpoint schemas of the qlab backend.
pub mod endpoints;
/// API client with auth interceptors, and the session store.
pub mod client;
/// Command-line / environment configuration.
pub mod config;
/// Logging shim that ships records to the backend.
pub mod logging;
/// Footer and widget stores.
pub mod ui;

pub use qlab_common::*;
