use qlab_common::storage::KeyValueStore;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// In-memory copy of the session.
///
/// `access_token` alone decides whether the session is authenticated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    /// Short-lived access token
    pub access_token: Option<SmolStr>,
    /// Refresh token used to obtain new access tokens
    pub refresh_token: Option<SmolStr>,
    /// Account name
    pub username: Option<SmolStr>,
    /// Given name
    pub first_name: Option<SmolStr>,
    /// Family name
    pub last_name: Option<SmolStr>,
    /// Contact address
    pub email: Option<SmolStr>,
}

impl SessionData {
    /// True iff an access token is held.
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    /// Read every field from `store`. Missing keys stay `None`.
    pub async fn load<S>(store: &S) -> Self
    where
        S: KeyValueStore + ?Sized,
    {
        let mut data = SessionData::default();
        for field in Field::ALL {
            *field.slot(&mut data) = store.get(field.key()).await.map(SmolStr::from);
        }
        data
    }
}

/// A persisted session field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// `access_token`
    AccessToken,
    /// `refresh_token`
    RefreshToken,
    /// `username`
    Username,
    /// `first_name`
    FirstName,
    /// `last_name`
    LastName,
    /// `email`
    Email,
}

impl Field {
    /// Every field, in storage order.
    pub const ALL: [Field; 6] = [
        Field::AccessToken,
        Field::RefreshToken,
        Field::Username,
        Field::FirstName,
        Field::LastName,
        Field::Email,
    ];

    /// Storage key of the field.
    pub const fn key(self) -> &'static str {
        match self {
            Field::AccessToken => "access_token",
            Field::RefreshToken => "refresh_token",
            Field::Username => "username",
            Field::FirstName => "first_name",
            Field::LastName => "last_name",
            Field::Email => "email",
        }
    }

    pub(crate) fn slot(self, data: &mut SessionData) -> &mut Option<SmolStr> {
        match self {
            Field::AccessToken => &mut data.access_token,
            Field::RefreshToken => &mut data.refresh_token,
            Field::Username => &mut data.username,
            Field::FirstName => &mut data.first_name,
            Field::LastName => &mut data.last_name,
            Field::Email => &mut data.email,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qlab_common::storage::MemoryStore;

    #[tokio::test]
    async fn load_reads_each_key() {
        let store = MemoryStore::default();
        store.set("access_token", "A1").await.unwrap();
        store.set("username", "alice").await.unwrap();

        let data = SessionData::load(&store).await;
        assert!(data.is_authenticated());
        assert_eq!(data.access_token.as_deref(), Some("A1"));
        assert_eq!(data.username.as_deref(), Some("alice"));
        assert!(data.refresh_token.is_none());
        assert!(data.email.is_none());
    }

    #[test]
    fn keys_are_unique() {
        let mut keys: Vec<_> = Field::ALL.iter().map(|f| f.key()).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), Field::ALL.len());
    }
}
