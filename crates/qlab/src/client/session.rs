use std::sync::Arc;

use qlab_common::api::{ApiRequest, Response};
use qlab_common::error::{AuthError, ClientError, Result};
use qlab_common::http_client::HttpClient;
use qlab_common::storage::KeyValueStore;
use serde_json::{Value, json};
use smol_str::SmolStr;
use tokio::sync::RwLock;

use crate::client::token::{Field, SessionData};
use crate::client::{ApiClient, Authenticator};
use crate::endpoints::{
    ChangePassword, GetProfile, ObtainToken, Profile, RefreshToken, RegisteredUser, Registration,
    UpdateProfile,
};
use crate::logging::{LogLevel, LogSink, TracingSink};

/// Stateful session for username/password accounts.
///
/// - Holds the access/refresh tokens and profile fields, mirrored into a
///   pluggable [`KeyValueStore`] on every change.
/// - Authenticated while an access token is held; [`logout`](Self::logout)
///   and a failed refresh return it to the unauthenticated state.
/// - Implements [`Authenticator`], so calls sent through
///   [`send`](Self::send) carry the access token and refresh once on `401`.
pub struct AuthSession<S, T> {
    store: Arc<S>,
    client: Arc<ApiClient<T>>,
    state: RwLock<SessionData>,
    log: Arc<dyn LogSink>,
}

impl<S, T> AuthSession<S, T>
where
    S: KeyValueStore,
{
    /// Create an unauthenticated session. Storage is not read; see [`restore`](Self::restore).
    pub fn new(store: Arc<S>, client: Arc<ApiClient<T>>) -> Self {
        Self {
            store,
            client,
            state: RwLock::new(SessionData::default()),
            log: Arc::new(TracingSink),
        }
    }

    /// Create a session hydrated from whatever `store` already holds.
    pub async fn load(store: Arc<S>, client: Arc<ApiClient<T>>) -> Self {
        let session = Self::new(store, client);
        session.restore().await;
        session
    }

    /// Return a copy writing its log records to `log`.
    pub fn with_logger(self, log: Arc<dyn LogSink>) -> Self {
        Self { log, ..self }
    }

    /// Replace the in-memory state with the persisted copy.
    pub async fn restore(&self) {
        let data = SessionData::load(self.store.as_ref()).await;
        tracing::debug!(authenticated = data.is_authenticated(), "restored session");
        *self.state.write().await = data;
    }

    /// True iff an access token is held.
    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.is_authenticated()
    }

    /// Current access token, if logged in.
    pub async fn access_token(&self) -> Option<SmolStr> {
        self.state.read().await.access_token.clone()
    }

    /// Current refresh token, if logged in.
    pub async fn refresh_token(&self) -> Option<SmolStr> {
        self.state.read().await.refresh_token.clone()
    }

    /// Copy of every session field.
    pub async fn snapshot(&self) -> SessionData {
        self.state.read().await.clone()
    }

    /// Clear every session field and its persisted copy.
    pub async fn logout(&self) -> Result<()> {
        self.write_fields(Field::ALL.map(|field| (field, None))).await?;
        self.log.log(LogLevel::Info, "Logged out", &Value::Null);
        Ok(())
    }

    /// Set fields in memory, then mirror them into storage.
    ///
    /// The in-memory update always completes, so a storage failure can leave
    /// storage behind memory but never the other way round.
    async fn write_fields<I>(&self, updates: I) -> Result<()>
    where
        I: IntoIterator<Item = (Field, Option<SmolStr>)>,
    {
        let updates: Vec<_> = updates.into_iter().collect();
        let mut state = self.state.write().await;
        for (field, value) in &updates {
            *field.slot(&mut state) = value.clone();
        }
        for (field, value) in updates {
            match value {
                Some(value) => self.store.set(field.key(), &value).await?,
                None => self.store.remove(field.key()).await?,
            }
        }
        Ok(())
    }
}

impl<S, T> AuthSession<S, T>
where
    S: KeyValueStore,
    T: HttpClient + Send + Sync + 'static,
{
    /// Send a request authenticated with this session.
    pub async fn send<R>(&self, request: &R) -> Result<Response<R>>
    where
        R: ApiRequest + Sync,
    {
        self.client.send(request, self).await
    }

    /// Log in with a username and password, then fetch the profile.
    ///
    /// Any previous tokens are discarded first. A `401` from the token
    /// endpoint surfaces as [`AuthError::InvalidCredentials`].
    #[tracing::instrument(level = "debug", skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<Profile> {
        self.write_fields([(Field::AccessToken, None), (Field::RefreshToken, None)])
            .await?;
        self.log.log(
            LogLevel::Debug,
            "Requesting token pair",
            &json!({ "username": username }),
        );

        let request = ObtainToken::builder()
            .username(username)
            .password(password)
            .build();
        let pair = match self
            .client
            .send_anonymous(&request)
            .await
            .and_then(Response::into_output)
        {
            Ok(pair) => pair,
            Err(err) => {
                self.log.log(
                    LogLevel::Error,
                    "Login failed",
                    &json!({ "username": username, "error": err.to_string() }),
                );
                return Err(match err {
                    ClientError::Auth(AuthError::Unauthorized(e)) => {
                        AuthError::InvalidCredentials(e).into()
                    }
                    other => other,
                });
            }
        };

        self.write_fields([
            (Field::AccessToken, Some(pair.access)),
            (Field::RefreshToken, Some(pair.refresh)),
        ])
        .await?;
        self.profile().await
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// Only the access token is replaced. Any failure, including having no
    /// refresh token, logs the session out and yields [`AuthError::SessionExpired`].
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn refresh_access_token(&self) -> Result<SmolStr> {
        let Some(refresh) = self.refresh_token().await else {
            self.logout().await?;
            return Err(AuthError::SessionExpired.into());
        };

        match self
            .client
            .send_anonymous(&RefreshToken { refresh })
            .await
            .and_then(Response::into_output)
        {
            Ok(out) => {
                self.write_fields([(Field::AccessToken, Some(out.access.clone()))])
                    .await?;
                self.log.log(LogLevel::Debug, "Access token refreshed", &Value::Null);
                Ok(out.access)
            }
            Err(err) => {
                self.log.log(
                    LogLevel::Warning,
                    "Token refresh failed, ending session",
                    &json!({ "error": err.to_string() }),
                );
                self.logout().await?;
                Err(AuthError::SessionExpired.into())
            }
        }
    }

    /// Create an account. The session itself is left untouched.
    #[tracing::instrument(level = "debug", skip_all, fields(username = %registration.username))]
    pub async fn register(&self, registration: &Registration) -> Result<RegisteredUser> {
        self.log.log(
            LogLevel::Debug,
            "Registering account",
            &json!({
                "username": registration.username,
                "first_name": registration.first_name,
                "last_name": registration.last_name,
                "email": registration.email,
            }),
        );
        let user = self.send(registration).await?.into_output()?;
        self.log.log(LogLevel::Debug, "Registration successful", &Value::Null);
        Ok(user)
    }

    /// Fetch the profile and store username, names and email.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn profile(&self) -> Result<Profile> {
        let profile = match self.send(&GetProfile).await.and_then(Response::into_output) {
            Ok(profile) => profile,
            Err(err) => {
                self.log.log(
                    LogLevel::Error,
                    "Profile fetch failed",
                    &json!({ "error": err.to_string() }),
                );
                return Err(err);
            }
        };
        self.write_fields([
            (Field::Username, Some(profile.username.clone())),
            (Field::FirstName, Some(profile.first_name.clone())),
            (Field::LastName, Some(profile.last_name.clone())),
            (Field::Email, Some(profile.email.clone())),
        ])
        .await?;
        Ok(profile)
    }

    /// Update names and email; the stored fields take the values the server returns.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn update_profile(
        &self,
        first_name: &str,
        last_name: &str,
        email: &str,
    ) -> Result<UpdateProfile> {
        let request = UpdateProfile::builder()
            .first_name(first_name)
            .last_name(last_name)
            .email(email)
            .build();
        let updated = match self.send(&request).await.and_then(Response::into_output) {
            Ok(updated) => updated,
            Err(err) => {
                self.log.log(
                    LogLevel::Error,
                    "Profile update failed",
                    &json!({ "error": err.to_string() }),
                );
                return Err(err);
            }
        };
        self.write_fields([
            (Field::FirstName, Some(updated.first_name.clone())),
            (Field::LastName, Some(updated.last_name.clone())),
            (Field::Email, Some(updated.email.clone())),
        ])
        .await?;
        Ok(updated)
    }

    /// Change the password. The session itself is left untouched.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn change_password(&self, old_password: &str, new_password: &str) -> Result<()> {
        let request = ChangePassword {
            old_password: old_password.into(),
            new_password: new_password.into(),
        };
        match self.send(&request).await.and_then(Response::into_output) {
            Ok(_) => {
                self.log.log(LogLevel::Debug, "Password change successful", &Value::Null);
                Ok(())
            }
            Err(err) => {
                self.log.log(
                    LogLevel::Error,
                    "Password change failed",
                    &json!({ "error": err.to_string() }),
                );
                Err(err)
            }
        }
    }
}

impl<S, T> Authenticator for AuthSession<S, T>
where
    S: KeyValueStore,
    T: HttpClient + Send + Sync + 'static,
{
    async fn access_token(&self) -> Option<SmolStr> {
        AuthSession::access_token(self).await
    }

    async fn refresh_token(&self) -> Option<SmolStr> {
        AuthSession::refresh_token(self).await
    }

    async fn refresh(&self) -> Result<SmolStr> {
        self.refresh_access_token().await
    }
}
