//! API 라우트.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (liveness)
//! - `/health/ready` - 상세 헬스 체크 (readiness)
//! - `/api/auth` - 회원가입, 로그인 (공개)
//! - `/api/resources` - 역할별 보호 리소스
//! - `/api/resources/admin/users` - 관리자 계정 관리
//!
//! `/api` 아래의 모든 라우트는 인가 게이트를 거칩니다.

pub mod admin;
pub mod auth;
pub mod health;
pub mod resources;

pub use admin::{admin_router, AssignRolesRequest, UsersListResponse};
pub use auth::{auth_router, LoginRequest, LoginResponse, RegisterRequest, UserSummary};
pub use health::{health_router, ComponentHealth, ComponentStatus, HealthResponse};
pub use resources::{resources_router, ResourceResponse};

use axum::{middleware, Router};
use std::sync::Arc;

use crate::auth::authorization_gate;
use crate::middleware::rate_limit_middleware;
use crate::state::AppState;

/// `/api` 라우터 생성.
///
/// 게이트는 `route_layer`로 적용되어 매칭된 라우트에만 실행되고, 중첩이 끝난 뒤
/// 전체 경로를 기준으로 판정합니다. 인증 라우트에는 rate limit이 추가로 걸립니다.
pub fn create_api_router(state: Arc<AppState>) -> Router {
    let auth_routes = match state.rate_limit.clone() {
        Some(rate_limit) => auth_router().route_layer(middleware::from_fn_with_state(
            rate_limit,
            rate_limit_middleware,
        )),
        None => auth_router(),
    };

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/resources", resources_router())
        .nest("/api/resources/admin", admin_router())
        .route_layer(middleware::from_fn_with_state(
            state.gate.clone(),
            authorization_gate,
        ))
        .with_state(state)
}

/// 헬스 체크 라우터 (게이트 없음).
pub fn create_health_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/health", health_router())
        .with_state(state)
}
