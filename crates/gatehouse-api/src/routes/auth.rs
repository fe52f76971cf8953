//! 인증 endpoint.
//!
//! # 엔드포인트
//!
//! - `POST /api/auth/register` - 회원가입
//! - `POST /api/auth/login` - 로그인 (Bearer 토큰 발급)

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use gatehouse_core::{Registration, RegistrationError, User};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::error::{ApiError, ApiErrorResponse, ApiResult};
use crate::metrics::{record_login, record_registration};
use crate::state::AppState;

// ==================== 요청/응답 타입 ====================

/// 회원가입 요청.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 50, message = "사용자 이름은 3~50자여야 합니다"))]
    pub username: String,
    #[validate(length(min = 5, message = "비밀번호는 5자 이상이어야 합니다"))]
    pub password: String,
    #[validate(email(message = "이메일 형식이 올바르지 않습니다"))]
    pub email: String,
    #[validate(length(max = 100, message = "이름은 100자 이하여야 합니다"))]
    pub name: String,
}

impl RegisterRequest {
    /// 앞뒤 공백 제거. 길이 검증은 저장될 값 기준이어야 합니다.
    pub fn trimmed(self) -> Self {
        Self {
            username: self.username.trim().to_string(),
            password: self.password,
            email: self.email.trim().to_string(),
            name: self.name.trim().to_string(),
        }
    }
}

impl From<RegisterRequest> for Registration {
    fn from(request: RegisterRequest) -> Self {
        Registration {
            username: request.username,
            password: request.password,
            email: request.email,
            name: request.name,
        }
    }
}

/// 사용자 요약 (비밀번호 해시 제외).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub name: String,
    /// 정규형 역할 이름 (예: `["USER"]`)
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            roles: user.roles.names(),
            created_at: user.created_at,
        }
    }
}

/// 로그인 요청.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// 로그인 응답.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    /// 서명된 JWT
    pub token: String,
    /// 항상 "Bearer"
    #[serde(rename = "type")]
    pub token_type: String,
    pub username: String,
    pub roles: Vec<String>,
    pub expires_at: DateTime<Utc>,
}

// ==================== 핸들러 ====================

/// 회원가입.
///
/// POST /api/auth/register
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "가입 완료", body = UserSummary),
        (status = 400, description = "잘못된 입력", body = ApiErrorResponse),
        (status = 409, description = "이미 존재하는 사용자 이름", body = ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<UserSummary>)> {
    let request = match payload {
        Ok(Json(request)) => request.trimmed(),
        Err(rejection) => {
            record_registration("invalid");
            return Err(rejection.into());
        }
    };

    if let Err(errors) = request.validate() {
        record_registration("invalid");
        return Err(errors.into());
    }

    match state.auth.register(request.into()).await {
        Ok(user) => {
            record_registration("success");
            Ok((StatusCode::CREATED, Json(UserSummary::from(&user))))
        }
        Err(e) => {
            record_registration(match e {
                RegistrationError::DuplicateUsername(_) => "duplicate",
                RegistrationError::InvalidInput(_) => "invalid",
                _ => "error",
            });
            Err(e.into())
        }
    }
}

/// 로그인.
///
/// 실패 원인(없는 사용자, 비밀번호 불일치, 해석할 수 없는 본문)은 응답에서 구분되지 않습니다.
///
/// POST /api/auth/login
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "로그인 성공", body = LoginResponse),
        (status = 401, description = "인증 실패", body = ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<LoginResponse>> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(
                reason = "malformed_body",
                error = %rejection.body_text(),
                "로그인 실패"
            );
            record_login("malformed_body");
            return Err(ApiError::unauthorized());
        }
    };

    let outcome = state
        .auth
        .login(&request.username, &request.password)
        .await
        .map_err(|e| {
            record_login(e.reason());
            ApiError::from(e)
        })?;

    record_login("success");

    Ok(Json(LoginResponse {
        token: outcome.token.token,
        token_type: "Bearer".to_string(),
        username: outcome.user.username,
        roles: outcome.user.roles.names(),
        expires_at: outcome.token.expires_at,
    }))
}

/// 인증 라우터 생성.
pub fn auth_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(username: &str, password: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            password: password.to_string(),
            email: email.to_string(),
            name: "Test".to_string(),
        }
    }

    #[test]
    fn test_register_request_validation() {
        assert!(request("alice", "pw123", "alice@example.com").validate().is_ok());

        let errors = request("al", "pw", "not-an-email").validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("username"));
        assert!(fields.contains_key("password"));
        assert!(fields.contains_key("email"));
    }

    #[test]
    fn test_username_length_checked_after_trim() {
        let request = request("  ab  ", "pw123", " alice@example.com ").trimmed();
        assert_eq!(request.username, "ab");
        assert_eq!(request.email, "alice@example.com");

        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("username"));
        assert!(!errors.field_errors().contains_key("email"));
    }

    #[test]
    fn test_login_response_uses_type_field() {
        let response = LoginResponse {
            token: "abc".to_string(),
            token_type: "Bearer".to_string(),
            username: "alice".to_string(),
            roles: vec!["USER".to_string()],
            expires_at: Utc::now(),
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["type"], "Bearer");
        assert!(json.get("token_type").is_none());
    }
}
