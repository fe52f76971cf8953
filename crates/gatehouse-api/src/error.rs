//! 통합 API 에러 응답 타입.
//!
//! 도메인 에러를 HTTP 상태 코드와 JSON 본문으로 변환합니다.
//! 인증 실패는 원인과 관계없이 같은 응답을 돌려주고, 원인은 로그에만 남깁니다.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gatehouse_core::{AccountError, AuthError, GateRejection, RegistrationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// 인증 실패 시 공통 메시지.
pub const UNAUTHORIZED_MESSAGE: &str = "인증에 실패했습니다";

/// 인가 실패 시 공통 메시지.
pub const FORBIDDEN_MESSAGE: &str = "이 리소스에 접근할 권한이 없습니다";

/// API 에러 응답 본문.
///
/// ```json
/// {
///   "code": "UNAUTHORIZED",
///   "message": "인증에 실패했습니다",
///   "timestamp": 1738300800
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorResponse {
    /// 에러 코드 (예: "UNAUTHORIZED", "VALIDATION_ERROR", "NOT_FOUND")
    pub code: String,
    /// 사람이 읽을 수 있는 에러 메시지
    pub message: String,
    /// 추가 상세 정보
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// 에러 발생 시각 (Unix timestamp)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl ApiErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: Some(chrono::Utc::now().timestamp()),
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        Self {
            details: Some(details),
            ..Self::new(code, message)
        }
    }
}

impl std::fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// 상태 코드가 붙은 API 에러.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ApiErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ApiErrorResponse::new(code, message),
        }
    }

    /// 401. 원인을 구분하지 않습니다.
    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", UNAUTHORIZED_MESSAGE)
    }

    /// 403. 필요한 역할은 노출하지 않습니다.
    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", FORBIDDEN_MESSAGE)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_INPUT", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "DUPLICATE_USERNAME", message)
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "서버 내부 오류가 발생했습니다",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<RegistrationError> for ApiError {
    fn from(err: RegistrationError) -> Self {
        match err {
            RegistrationError::DuplicateUsername(_) => {
                ApiError::conflict("이미 사용 중인 사용자 이름입니다")
            }
            RegistrationError::InvalidInput(message) => ApiError::bad_request(message),
            other => {
                tracing::error!(error = %other, "회원가입 처리 중 내부 오류");
                ApiError::internal()
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        if err.is_credential_failure() {
            ApiError::unauthorized()
        } else {
            tracing::error!(error = %err, "로그인 처리 중 내부 오류");
            ApiError::internal()
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::UserNotFound(username) => {
                ApiError::not_found(format!("사용자를 찾을 수 없습니다: {}", username))
            }
            AccountError::InvalidInput(message) => ApiError::bad_request(message),
            AccountError::Store(e) => {
                tracing::error!(error = %e, "계정 작업 중 저장소 오류");
                ApiError::internal()
            }
        }
    }
}

impl From<GateRejection> for ApiError {
    fn from(rejection: GateRejection) -> Self {
        match rejection {
            GateRejection::Unauthenticated(_) => ApiError::unauthorized(),
            GateRejection::Forbidden(_) => ApiError::forbidden(),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let fields: serde_json::Map<String, Value> = errors
            .field_errors()
            .iter()
            .map(|(field, errors)| {
                let messages: Vec<Value> = errors
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("{}: 유효하지 않은 값", field))
                            .into()
                    })
                    .collect();
                (field.to_string(), Value::Array(messages))
            })
            .collect();

        Self {
            status: StatusCode::BAD_REQUEST,
            body: ApiErrorResponse::with_details(
                "VALIDATION_ERROR",
                "요청 값이 유효하지 않습니다",
                Value::Object(fields),
            ),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ApiErrorResponse::with_details(
                "VALIDATION_ERROR",
                "요청 본문을 해석할 수 없습니다",
                serde_json::json!({ "body": rejection.body_text() }),
            ),
        }
    }
}

/// API 핸들러 Result 타입 별칭.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_core::{
        AuthorizationError, Role, RoleRequirement, StoreError, UnauthenticatedReason,
        VerificationError,
    };

    #[test]
    fn test_api_error_response_new() {
        let error = ApiErrorResponse::new("TEST_ERROR", "Test message");
        assert_eq!(error.code, "TEST_ERROR");
        assert!(error.timestamp.is_some());
        assert!(error.details.is_none());

        let json = serde_json::to_string(&error).unwrap();
        assert!(!json.contains("details"));
    }

    #[test]
    fn test_credential_failures_are_indistinguishable() {
        let a = ApiError::from(AuthError::NoSuchUser("ghost".into()));
        let b = ApiError::from(AuthError::BadCredentials("alice".into()));
        let c = ApiError::from(GateRejection::Unauthenticated(
            UnauthenticatedReason::Verification(VerificationError::Expired),
        ));

        for err in [&a, &b, &c] {
            assert_eq!(err.status, StatusCode::UNAUTHORIZED);
            assert_eq!(err.body.code, "UNAUTHORIZED");
            assert_eq!(err.body.message, UNAUTHORIZED_MESSAGE);
        }
        assert!(!a.body.message.contains("ghost"));
    }

    #[test]
    fn test_forbidden_hides_required_role() {
        let err = ApiError::from(GateRejection::Forbidden(
            AuthorizationError::InsufficientRole {
                required: RoleRequirement::Single(Role::admin()),
                held: [Role::user()].into_iter().collect(),
            },
        ));

        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert!(!err.body.message.contains("ADMIN"));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(RegistrationError::DuplicateUsername("a".into())).status,
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(RegistrationError::InvalidInput("x".into())).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(AccountError::UserNotFound("a".into())).status,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(AuthError::Store(StoreError::Backend("down".into()))).status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
