//! API client with authentication interceptors.
//!
//! [`ApiClient`] is constructed once at start-up and shared (behind an `Arc`)
//! by everything that talks to the backend. Authentication state is not stored
//! in the client; each call is given an [`Authenticator`] which supplies the
//! bearer token and knows how to refresh it.

/// Session store: tokens, profile fields and the account operations.
pub mod session;
/// Session fields and their storage keys.
pub mod token;

use std::future::Future;
use std::time::Duration;

use qlab_common::AuthorizationToken;
use qlab_common::api::{ApiExt, ApiRequest, Response};
use qlab_common::error::{AuthError, Result, TransportError};
use qlab_common::http_client::HttpClient;
use smol_str::SmolStr;
use url::Url;

/// Per-call timeout applied when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Supplies credentials to the [`ApiClient`] interceptors.
#[cfg_attr(not(target_arch = "wasm32"), trait_variant::make(Send))]
pub trait Authenticator {
    /// Current access token, attached as `Authorization: Bearer <token>`.
    fn access_token(&self) -> impl Future<Output = Option<SmolStr>>;

    /// Current refresh token. Without one, a `401` is not retried.
    fn refresh_token(&self) -> impl Future<Output = Option<SmolStr>>;

    /// Obtain a new access token and return it.
    fn refresh(&self) -> impl Future<Output = Result<SmolStr>>;
}

/// Authenticator for anonymous calls: no token, nothing to refresh.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unauthenticated;

impl Authenticator for Unauthenticated {
    async fn access_token(&self) -> Option<SmolStr> {
        None
    }

    async fn refresh_token(&self) -> Option<SmolStr> {
        None
    }

    async fn refresh(&self) -> Result<SmolStr> {
        Err(AuthError::NotAuthenticated.into())
    }
}

/// Position of a call in its retry cycle.
///
/// Passed explicitly through the request pipeline. Only the first attempt of
/// a call may trigger a token refresh; the replay after a refresh is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Attempt(u8);

impl Attempt {
    /// The original call.
    pub const FIRST: Attempt = Attempt(0);
    /// The single replay after a refresh.
    pub const RETRY: Attempt = Attempt(1);

    /// Zero-based attempt number.
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Whether a `401` on this attempt may be answered with a refresh.
    pub const fn may_refresh(self) -> bool {
        self.0 < Self::RETRY.0
    }

    /// The attempt that follows this one.
    pub const fn next(self) -> Attempt {
        Attempt(self.0.saturating_add(1))
    }
}

/// HTTP client wrapper for the qlab backend.
///
/// - Request interceptor: attaches the authenticator's access token as a bearer token.
/// - Response interceptor: on `401`, when the call is a first attempt and the
///   authenticator holds a refresh token, refreshes once and replays the call
///   with the new token. Every other outcome is returned unchanged.
///
/// Concurrent calls that hit `401` at the same time each run their own refresh.
#[derive(Debug, Clone)]
pub struct ApiClient<T> {
    http: T,
    base: Url,
    timeout: Duration,
}

impl<T> ApiClient<T> {
    /// Create a client sending to `base` with the default timeout.
    pub fn new(http: T, base: Url) -> Self {
        Self {
            http,
            base,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Return a copy using the given per-call timeout.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }
}

impl<T> ApiClient<T>
where
    T: HttpClient + Sync,
{
    /// Send `request`, authenticating with `auth`.
    pub async fn send<R, A>(&self, request: &R, auth: &A) -> Result<Response<R>>
    where
        R: ApiRequest + Sync,
        A: Authenticator + Sync,
    {
        let mut attempt = Attempt::FIRST;
        let mut bearer = auth.access_token().await;
        loop {
            let err = match self.dispatch(request, bearer.as_ref(), attempt).await {
                Err(err) if err.is_unauthorized() => err,
                other => return other,
            };
            if !attempt.may_refresh() {
                tracing::debug!(path = R::PATH, attempt = attempt.get(), "unauthorized after refresh");
                return Err(err);
            }
            if auth.refresh_token().await.is_none() {
                return Err(err);
            }
            tracing::info!(path = R::PATH, "access token rejected, refreshing");
            bearer = Some(auth.refresh().await?);
            attempt = attempt.next();
        }
    }

    /// Send `request` without credentials.
    pub async fn send_anonymous<R>(&self, request: &R) -> Result<Response<R>>
    where
        R: ApiRequest + Sync,
    {
        self.send(request, &Unauthenticated).await
    }

    async fn dispatch<R>(
        &self,
        request: &R,
        bearer: Option<&SmolStr>,
        attempt: Attempt,
    ) -> Result<Response<R>>
    where
        R: ApiRequest + Sync,
    {
        tracing::debug!(
            method = ?R::METHOD,
            path = R::PATH,
            attempt = attempt.get(),
            authenticated = bearer.is_some(),
            "sending request"
        );
        let mut call = self.http.api(self.base.clone());
        if let Some(token) = bearer {
            call = call.auth(AuthorizationToken::Bearer(token.clone()));
        }
        match tokio::time::timeout(self.timeout, call.send(request)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_first_attempt_may_refresh() {
        assert!(Attempt::FIRST.may_refresh());
        assert_eq!(Attempt::FIRST.next(), Attempt::RETRY);
        assert!(!Attempt::RETRY.may_refresh());
        assert!(!Attempt::RETRY.next().may_refresh());
    }

    #[tokio::test]
    async fn unauthenticated_has_nothing_to_offer() {
        assert!(Unauthenticated.access_token().await.is_none());
        assert!(Unauthenticated.refresh_token().await.is_none());
        assert!(matches!(
            Unauthenticated.refresh().await,
            Err(qlab_common::error::ClientError::Auth(AuthError::NotAuthenticated))
        ));
    }
}
