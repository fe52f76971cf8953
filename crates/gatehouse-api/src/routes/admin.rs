//! 관리자 계정 관리 endpoint.
//!
//! `/api/resources/admin/**` 아래에 마운트되므로 게이트가 ADMIN 역할을 요구합니다.
//!
//! # 엔드포인트
//!
//! - `GET /api/resources/admin/users` - 사용자 목록
//! - `PUT /api/resources/admin/users/{username}/roles` - 역할 교체
//! - `DELETE /api/resources/admin/users/{username}` - 사용자 삭제

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, put},
    Json, Router,
};
use gatehouse_core::RoleSet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiErrorResponse, ApiResult};
use crate::routes::auth::UserSummary;
use crate::state::AppState;

/// 사용자 목록 응답.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UsersListResponse {
    pub users: Vec<UserSummary>,
    pub total: usize,
}

/// 역할 교체 요청.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignRolesRequest {
    /// 새 역할 집합 (대소문자, `ROLE_` 접두사 무관)
    pub roles: Vec<String>,
}

/// 사용자 목록 조회.
///
/// GET /api/resources/admin/users
#[utoipa::path(
    get,
    path = "/api/resources/admin/users",
    responses(
        (status = 200, description = "사용자 목록", body = UsersListResponse),
        (status = 403, description = "권한 부족", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<UsersListResponse>> {
    let users: Vec<UserSummary> = state
        .auth
        .list_users()
        .await?
        .iter()
        .map(UserSummary::from)
        .collect();

    Ok(Json(UsersListResponse {
        total: users.len(),
        users,
    }))
}

/// 사용자 역할 교체.
///
/// 이미 발급된 토큰은 만료될 때까지 이전 역할을 유지합니다.
///
/// PUT /api/resources/admin/users/{username}/roles
#[utoipa::path(
    put,
    path = "/api/resources/admin/users/{username}/roles",
    params(
        ("username" = String, Path, description = "대상 사용자 이름")
    ),
    request_body = AssignRolesRequest,
    responses(
        (status = 200, description = "변경된 사용자", body = UserSummary),
        (status = 400, description = "잘못된 역할", body = ApiErrorResponse),
        (status = 404, description = "사용자 없음", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn assign_roles(
    State(state): State<Arc<AppState>>,
    CurrentUser(admin): CurrentUser,
    Path(username): Path<String>,
    Json(request): Json<AssignRolesRequest>,
) -> ApiResult<Json<UserSummary>> {
    let roles = RoleSet::parse(&request.roles)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let user = state.auth.assign_roles(&username, roles).await?;
    info!(admin = %admin.subject, username = %username, "관리자 역할 변경 요청 처리");

    Ok(Json(UserSummary::from(&user)))
}

/// 사용자 삭제.
///
/// DELETE /api/resources/admin/users/{username}
#[utoipa::path(
    delete,
    path = "/api/resources/admin/users/{username}",
    params(
        ("username" = String, Path, description = "대상 사용자 이름")
    ),
    responses(
        (status = 204, description = "삭제 완료"),
        (status = 404, description = "사용자 없음", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    CurrentUser(admin): CurrentUser,
    Path(username): Path<String>,
) -> ApiResult<StatusCode> {
    state.auth.delete_user(&username).await?;
    info!(admin = %admin.subject, username = %username, "관리자 사용자 삭제 요청 처리");

    Ok(StatusCode::NO_CONTENT)
}

/// 관리자 라우터 생성. `/api/resources/admin`에 중첩됩니다.
pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{username}/roles", put(assign_roles))
        .route("/users/{username}", delete(delete_user))
}
