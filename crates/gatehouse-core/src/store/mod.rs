//! 자격 증명 저장소.
//!
//! 사용자 레코드의 조회/생성/수정/삭제 인터페이스. 사용자 이름의 고유성은
//! 저장소 자체의 제약으로 보장해야 합니다.

mod memory;

pub use memory::InMemoryCredentialStore;

use async_trait::async_trait;

use crate::domain::{NewUser, RoleSet, User};

/// 저장소 에러.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// 고유성 제약 위반
    #[error("이미 존재하는 사용자 이름: {0}")]
    DuplicateUsername(String),

    /// 백엔드 장애 (DB 연결 실패 등)
    #[error("저장소 백엔드 에러: {0}")]
    Backend(String),
}

/// 자격 증명 저장소 인터페이스.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// 사용자 이름으로 조회.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// 신규 사용자 삽입.
    ///
    /// 같은 이름이 이미 있으면 기존 레코드를 건드리지 않고
    /// `StoreError::DuplicateUsername`을 반환합니다.
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;

    /// 전체 사용자 목록 (사용자 이름 순).
    async fn list(&self) -> Result<Vec<User>, StoreError>;

    /// 역할 집합 교체. 사용자가 없으면 `None`.
    async fn update_roles(&self, username: &str, roles: &RoleSet)
        -> Result<Option<User>, StoreError>;

    /// 사용자 삭제. 삭제되었으면 `true`.
    async fn delete(&self, username: &str) -> Result<bool, StoreError>;
}
