//! 보호 리소스 endpoint.
//!
//! 접근 제어는 게이트가 경로 기준으로 이미 수행했으므로 핸들러는 호출자 정보만 사용합니다.
//!
//! - `GET /api/resources/user` - USER 또는 ADMIN
//! - `GET /api/resources/admin` - ADMIN
//! - `GET /api/resources/me` - 인증된 모든 호출자

use axum::{routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::CurrentUser;
use crate::error::ApiErrorResponse;
use crate::state::AppState;

/// 리소스 응답.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResourceResponse {
    pub message: String,
    /// 호출자 (토큰 subject)
    pub subject: String,
    pub roles: Vec<String>,
}

impl ResourceResponse {
    fn new(message: impl Into<String>, user: &CurrentUser) -> Self {
        Self {
            message: message.into(),
            subject: user.0.subject.clone(),
            roles: user.0.roles.names(),
        }
    }
}

/// 일반 사용자 리소스.
///
/// GET /api/resources/user
#[utoipa::path(
    get,
    path = "/api/resources/user",
    responses(
        (status = 200, description = "사용자 리소스", body = ResourceResponse),
        (status = 401, description = "인증 필요", body = ApiErrorResponse),
        (status = 403, description = "권한 부족", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "resources"
)]
pub async fn user_resource(user: CurrentUser) -> Json<ResourceResponse> {
    let message = format!("안녕하세요, {}님", user.0.subject);
    Json(ResourceResponse::new(message, &user))
}

/// 관리자 리소스.
///
/// GET /api/resources/admin
#[utoipa::path(
    get,
    path = "/api/resources/admin",
    responses(
        (status = 200, description = "관리자 리소스", body = ResourceResponse),
        (status = 401, description = "인증 필요", body = ApiErrorResponse),
        (status = 403, description = "권한 부족", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "resources"
)]
pub async fn admin_resource(user: CurrentUser) -> Json<ResourceResponse> {
    let message = format!("관리자 {}님, 환영합니다", user.0.subject);
    Json(ResourceResponse::new(message, &user))
}

/// 현재 호출자 정보.
///
/// GET /api/resources/me
#[utoipa::path(
    get,
    path = "/api/resources/me",
    responses(
        (status = 200, description = "호출자 정보", body = ResourceResponse),
        (status = 401, description = "인증 필요", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "resources"
)]
pub async fn me(user: CurrentUser) -> Json<ResourceResponse> {
    Json(ResourceResponse::new("인증됨", &user))
}

/// 리소스 라우터 생성.
///
/// 관리자 계정 관리 라우트(`/admin/users`)는 [`super::admin::admin_router`]에서 합쳐집니다.
pub fn resources_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/user", get(user_resource))
        .route("/admin", get(admin_resource))
        .route("/me", get(me))
}
