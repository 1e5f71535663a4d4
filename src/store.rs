use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::user::{NewUser, User};

/// Infrastructure failure of the backing store. Propagated to the caller
/// unmodified; the orchestrator adds no retries of its own.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("store unavailable: {0}")]
pub struct StoreError(pub String);

/// Persistence seam for user records.
///
/// Implementations must write a user record atomically as a whole; no flow
/// needs multi-user transactions.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_verification_code(&self, code: &str) -> Result<Option<User>, StoreError>;
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;
    async fn save(&self, user: &User) -> Result<(), StoreError>;
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
}

/// In-memory store for tests and embedding. Whole-record writes are atomic
/// under the lock.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.get(&id).cloned())
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn find_by_verification_code(&self, code: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.verification_code.as_deref() == Some(code))
            .cloned())
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == new_user.email) {
            return Err(StoreError(format!(
                "unique constraint violated on email {}",
                new_user.email
            )));
        }
        let user = User::from_new(new_user);
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn save(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        if !users.contains_key(&user.id) {
            return Err(StoreError(format!("save of unknown user {}", user.id)));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        users
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError(format!("delete of unknown user {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.into(),
            full_name: "Test User".into(),
            email_verified: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_and_find() {
        let store = MemoryUserStore::new();
        let created = store.create(new_user("a@b.com")).await.unwrap();
        let by_email = store.find_by_email("a@b.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, created.id);
        let by_id = store.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "a@b.com");
    }

    #[tokio::test]
    async fn create_enforces_email_uniqueness() {
        let store = MemoryUserStore::new();
        store.create(new_user("a@b.com")).await.unwrap();
        assert!(store.create(new_user("a@b.com")).await.is_err());
    }

    #[tokio::test]
    async fn save_replaces_whole_record() {
        let store = MemoryUserStore::new();
        let mut user = store.create(new_user("a@b.com")).await.unwrap();
        user.login_attempts = 3;
        user.reset_token = Some("token".into());
        store.save(&user).await.unwrap();
        let loaded = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(loaded.login_attempts, 3);
        assert_eq!(loaded.reset_token.as_deref(), Some("token"));
    }

    #[tokio::test]
    async fn lookup_by_external_id_and_code() {
        let store = MemoryUserStore::new();
        let mut user = store.create(new_user("a@b.com")).await.unwrap();
        user.external_id = Some("ext-123".into());
        user.verification_code = Some("4321".into());
        store.save(&user).await.unwrap();

        let by_ext = store.find_by_external_id("ext-123").await.unwrap();
        assert_eq!(by_ext.unwrap().id, user.id);
        let by_code = store.find_by_verification_code("4321").await.unwrap();
        assert_eq!(by_code.unwrap().id, user.id);
        assert!(store
            .find_by_verification_code("0000")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn delete_removes_user() {
        let store = MemoryUserStore::new();
        let user = store.create(new_user("a@b.com")).await.unwrap();
        store.delete(user.id).await.unwrap();
        assert!(store.find_by_id(user.id).await.unwrap().is_none());
        assert!(store.delete(user.id).await.is_err());
    }
}
