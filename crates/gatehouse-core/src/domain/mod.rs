//! 도메인 모델.

mod role;
mod user;

pub use role::{InvalidRole, Role, RoleSet};
pub use user::{NewUser, Registration, User};

/// 검증된 토큰이 증명하는 호출자 신원.
///
/// 게이트를 통과한 요청에 요청 범위 컨텍스트로 첨부됩니다.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Principal {
    /// 사용자 이름 (토큰 subject)
    pub subject: String,
    /// 토큰에 포함된 역할
    pub roles: RoleSet,
}

impl Principal {
    pub fn new(subject: impl Into<String>, roles: RoleSet) -> Self {
        Self {
            subject: subject.into(),
            roles,
        }
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }
}
