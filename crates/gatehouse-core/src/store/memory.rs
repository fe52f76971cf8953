//! 메모리 기반 자격 증명 저장소.
//!
//! 데모 모드와 테스트에서 사용합니다. 프로세스 종료 시 데이터가 사라집니다.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{CredentialStore, StoreError};
use crate::domain::{NewUser, RoleSet, User};

/// 메모리 저장소.
///
/// 확인 후 삽입을 하나의 쓰기 잠금 안에서 수행하므로 같은 이름의 동시 가입이
/// 둘 다 성공하는 일은 없습니다.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    users: RwLock<BTreeMap<String, User>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 저장된 사용자 수.
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(username).cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;

        if users.contains_key(&user.username) {
            return Err(StoreError::DuplicateUsername(user.username));
        }

        let user = user.into_user(Utc::now());
        users.insert(user.username.clone(), user.clone());
        Ok(user)
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.users.read().await.values().cloned().collect())
    }

    async fn update_roles(
        &self,
        username: &str,
        roles: &RoleSet,
    ) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().await;

        Ok(users.get_mut(username).map(|user| {
            user.roles = roles.clone();
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn delete(&self, username: &str) -> Result<bool, StoreError> {
        Ok(self.users.write().await.remove(username).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use std::sync::Arc;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            password_hash: "hash".to_string(),
            email: email.to_string(),
            name: username.to_string(),
            roles: [Role::user()].into_iter().collect(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = InMemoryCredentialStore::new();
        let created = store.insert(new_user("alice", "a@example.com")).await.unwrap();

        let found = store.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(store.find_by_username("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_does_not_mutate_existing() {
        let store = InMemoryCredentialStore::new();
        store.insert(new_user("alice", "first@example.com")).await.unwrap();

        let err = store
            .insert(new_user("alice", "second@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateUsername(_)));

        let found = store.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(found.email, "first@example.com");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_same_username() {
        let store = Arc::new(InMemoryCredentialStore::new());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .insert(new_user("alice", &format!("{}@example.com", i)))
                        .await
                })
            })
            .collect();

        let mut ok = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                ok += 1;
            }
        }

        assert_eq!(ok, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_update_roles_and_delete() {
        let store = InMemoryCredentialStore::new();
        store.insert(new_user("alice", "a@example.com")).await.unwrap();

        let roles: RoleSet = [Role::user(), Role::admin()].into_iter().collect();
        let updated = store.update_roles("alice", &roles).await.unwrap().unwrap();
        assert_eq!(updated.roles, roles);
        assert!(store.update_roles("ghost", &roles).await.unwrap().is_none());

        assert!(store.delete("alice").await.unwrap());
        assert!(!store.delete("alice").await.unwrap());
        assert!(store.is_empty().await);
    }
}
