//! Internal users as seen by the login flow.
//!
//! Note storage owns the real user records; this module only defines the
//! calls the login flow makes against it, plus an in-memory implementation
//! the binary uses when run standalone.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub handle: String,
    pub full_name: String,
}

#[derive(Debug, Error)]
pub enum UserStoreError {
    #[error("user {0} not found")]
    NotFound(i64),
    #[error("user store failure: {0}")]
    Backend(String),
}

/// Durable provider credential, keyed by internal user and provider.
#[derive(Clone, PartialEq, Eq)]
pub struct StoredCredential {
    pub provider: &'static str,
    pub token: String,
    /// OAuth1 token secret; OAuth2 has none.
    pub secret: Option<String>,
}

impl std::fmt::Debug for StoredCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredCredential")
            .field("provider", &self.provider)
            .field("token", &"***")
            .field("secret", &self.secret.as_ref().map(|_| "***"))
            .finish()
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Return the user owning `handle`, creating it with `full_name` if needed.
    async fn get_or_create_user_by_handle(
        &self,
        handle: &str,
        full_name: &str,
    ) -> Result<User, UserStoreError>;

    async fn get_user_by_id(&self, id: i64) -> Result<User, UserStoreError>;

    /// Insert or replace the credential `user_id` holds for `credential.provider`.
    async fn save_provider_credential(
        &self,
        user_id: i64,
        credential: StoredCredential,
    ) -> Result<(), UserStoreError>;
}

#[derive(Default)]
struct Users {
    next_id: i64,
    by_id: HashMap<i64, User>,
    by_handle: HashMap<String, i64>,
    credentials: HashMap<(i64, &'static str), StoredCredential>,
}

/// Process-local user store with sequential IDs starting at 1.
#[derive(Default)]
pub struct MemoryUserStore {
    inner: Mutex<Users>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) async fn credential(
        &self,
        user_id: i64,
        provider: &str,
    ) -> Option<StoredCredential> {
        let users = self.inner.lock().await;
        users
            .credentials
            .iter()
            .find(|((id, name), _)| *id == user_id && *name == provider)
            .map(|(_, credential)| credential.clone())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get_or_create_user_by_handle(
        &self,
        handle: &str,
        full_name: &str,
    ) -> Result<User, UserStoreError> {
        let mut users = self.inner.lock().await;
        if let Some(user) = users
            .by_handle
            .get(handle)
            .and_then(|id| users.by_id.get(id))
        {
            return Ok(user.clone());
        }

        users.next_id += 1;
        let user = User {
            id: users.next_id,
            handle: handle.to_string(),
            full_name: full_name.to_string(),
        };
        users.by_handle.insert(user.handle.clone(), user.id);
        users.by_id.insert(user.id, user.clone());

        Ok(user)
    }

    async fn get_user_by_id(&self, id: i64) -> Result<User, UserStoreError> {
        let users = self.inner.lock().await;
        users
            .by_id
            .get(&id)
            .cloned()
            .ok_or(UserStoreError::NotFound(id))
    }

    async fn save_provider_credential(
        &self,
        user_id: i64,
        credential: StoredCredential,
    ) -> Result<(), UserStoreError> {
        let mut users = self.inner.lock().await;
        if !users.by_id.contains_key(&user_id) {
            return Err(UserStoreError::NotFound(user_id));
        }
        users
            .credentials
            .insert((user_id, credential.provider), credential);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[tokio::test]
    async fn get_or_create_is_idempotent_per_handle() -> Result<()> {
        let store = MemoryUserStore::new();
        let first = store.get_or_create_user_by_handle("kjk", "Krzysztof").await?;
        let again = store.get_or_create_user_by_handle("kjk", "Other Name").await?;
        let other = store.get_or_create_user_by_handle("github:kjk", "K").await?;

        assert_eq!(first.id, 1);
        assert_eq!(again, first);
        assert_eq!(other.id, 2);
        Ok(())
    }

    #[tokio::test]
    async fn lookup_by_id() -> Result<()> {
        let store = MemoryUserStore::new();
        let user = store.get_or_create_user_by_handle("kjk", "Krzysztof").await?;

        assert_eq!(store.get_user_by_id(user.id).await?, user);
        assert!(matches!(
            store.get_user_by_id(99).await,
            Err(UserStoreError::NotFound(99))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn credential_upsert_replaces_previous() -> Result<()> {
        let store = MemoryUserStore::new();
        let user = store.get_or_create_user_by_handle("kjk", "Krzysztof").await?;

        for token in ["first", "second"] {
            store
                .save_provider_credential(
                    user.id,
                    StoredCredential {
                        provider: "twitter",
                        token: token.to_string(),
                        secret: Some("s".to_string()),
                    },
                )
                .await?;
        }

        let saved = store.credential(user.id, "twitter").await;
        assert_eq!(saved.map(|c| c.token), Some("second".to_string()));
        assert_eq!(store.inner.lock().await.credentials.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn credential_for_unknown_user_fails() {
        let store = MemoryUserStore::new();
        let result = store
            .save_provider_credential(
                5,
                StoredCredential {
                    provider: "github",
                    token: "t".to_string(),
                    secret: None,
                },
            )
            .await;
        assert!(matches!(result, Err(UserStoreError::NotFound(5))));
    }
}
