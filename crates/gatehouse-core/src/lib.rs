//! # Gatehouse Core
//!
//! 상태 없는 JWT 인증과 역할 기반 인가의 핵심 구성 요소를 제공합니다.
//!
//! - 토큰 서비스: 서명 토큰 발급/검증
//! - 인증 흐름: 회원가입, 로그인
//! - 인가 게이트: 경로별 역할 요구사항 평가
//! - 자격 증명 저장소 인터페이스와 메모리 구현
//! - 설정 관리 및 로깅 인프라

pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod gate;
pub mod logging;
pub mod password;
pub mod store;
pub mod token;

pub use auth::{AuthenticationService, LoginOutcome};
pub use config::{AppConfig, ConfigError};
pub use domain::*;
pub use error::*;
pub use gate::{
    Access, AuthorizationGate, GateDecision, GateRejection, RoleRequirement, RoutePolicy,
    RouteRule, UnauthenticatedReason,
};
pub use password::{Argon2PasswordEncoder, PasswordEncoder, PasswordError};
pub use store::{CredentialStore, InMemoryCredentialStore, StoreError};
pub use token::{Claims, IssuedToken, TokenError, TokenService, VerificationError};
