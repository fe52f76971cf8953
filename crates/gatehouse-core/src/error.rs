//! 인증 흐름의 에러 타입.
//!
//! 호출자에게는 일반화된 실패만 노출하고, 내부 로그에서는 variant로 원인을 구분합니다.

use thiserror::Error;

use crate::domain::RoleSet;
use crate::gate::RoleRequirement;
use crate::password::PasswordError;
use crate::store::StoreError;
use crate::token::TokenError;

/// 회원가입 에러.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// 이미 존재하는 사용자 이름
    #[error("이미 사용 중인 사용자 이름입니다: {0}")]
    DuplicateUsername(String),

    /// 잘못된 입력
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    #[error("비밀번호 처리 실패: {0}")]
    Password(#[from] PasswordError),

    #[error("저장소 에러: {0}")]
    Store(StoreError),
}

impl From<StoreError> for RegistrationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateUsername(username) => Self::DuplicateUsername(username),
            other => Self::Store(other),
        }
    }
}

/// 로그인 에러.
#[derive(Debug, Error)]
pub enum AuthError {
    /// 존재하지 않는 사용자
    #[error("존재하지 않는 사용자: {0}")]
    NoSuchUser(String),

    /// 비밀번호 불일치
    #[error("잘못된 자격 증명: {0}")]
    BadCredentials(String),

    #[error("비밀번호 처리 실패: {0}")]
    Password(#[from] PasswordError),

    #[error("저장소 에러: {0}")]
    Store(#[from] StoreError),

    #[error("토큰 발급 실패: {0}")]
    Token(#[from] TokenError),
}

impl AuthError {
    /// 자격 증명 자체의 문제인지 (서버 내부 장애가 아닌지) 확인.
    pub fn is_credential_failure(&self) -> bool {
        matches!(self, AuthError::NoSuchUser(_) | AuthError::BadCredentials(_))
    }

    /// 로그/메트릭 라벨용 원인 코드.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::NoSuchUser(_) => "no_such_user",
            AuthError::BadCredentials(_) => "bad_credentials",
            AuthError::Password(_) => "password_error",
            AuthError::Store(_) => "store_error",
            AuthError::Token(_) => "token_error",
        }
    }
}

/// 권한 부족 에러.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    #[error("권한이 부족합니다 (필요: {required}, 보유: {held})")]
    InsufficientRole {
        required: RoleRequirement,
        held: RoleSet,
    },
}

/// 관리자용 계정 작업 에러.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("사용자를 찾을 수 없습니다: {0}")]
    UserNotFound(String),

    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    #[error("저장소 에러: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_store_error_maps_to_registration_error() {
        let err: RegistrationError = StoreError::DuplicateUsername("alice".into()).into();
        assert!(matches!(err, RegistrationError::DuplicateUsername(ref u) if u == "alice"));

        let err: RegistrationError = StoreError::Backend("down".into()).into();
        assert!(matches!(err, RegistrationError::Store(_)));
    }

    #[test]
    fn test_auth_error_classification() {
        assert!(AuthError::NoSuchUser("x".into()).is_credential_failure());
        assert!(AuthError::BadCredentials("x".into()).is_credential_failure());
        assert!(!AuthError::Store(StoreError::Backend("x".into())).is_credential_failure());
        assert_eq!(AuthError::NoSuchUser("x".into()).reason(), "no_such_user");
    }
}
