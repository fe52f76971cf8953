//! 사용자 계정 모델.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::RoleSet;

/// 저장된 사용자 계정.
///
/// `password_hash`는 PHC 형식 문자열이며 응답으로 내보내지 않습니다.
#[derive(Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// 고유 사용자 이름
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email: String,
    /// 표시 이름
    pub name: String,
    pub roles: RoleSet,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .field("email", &self.email)
            .field("name", &self.name)
            .field("roles", &self.roles)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// 저장소에 삽입할 신규 사용자.
///
/// 비밀번호는 이미 해싱된 상태여야 합니다.
#[derive(Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub name: String,
    pub roles: RoleSet,
}

impl NewUser {
    /// 식별자와 타임스탬프를 붙여 `User`로 변환.
    pub fn into_user(self, now: DateTime<Utc>) -> User {
        User {
            id: Uuid::new_v4(),
            username: self.username,
            password_hash: self.password_hash,
            email: self.email,
            name: self.name,
            roles: self.roles,
            created_at: now,
            updated_at: now,
        }
    }
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("name", &self.name)
            .field("roles", &self.roles)
            .finish_non_exhaustive()
    }
}

/// 회원가입 입력.
#[derive(Clone, Deserialize)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub email: String,
    pub name: String,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
