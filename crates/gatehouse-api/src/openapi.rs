//! OpenAPI 문서화 설정.
//!
//! utoipa로 REST API의 OpenAPI 3.0 스펙을 생성하고 `/api-docs/openapi.json`에서 제공합니다.
//!
//! 새로운 엔드포인트를 추가할 때:
//!
//! 1. 응답/요청 타입에 `#[derive(ToSchema)]` 추가
//! 2. 핸들러에 `#[utoipa::path(...)]` 어노테이션 추가
//! 3. 이 파일의 `components(schemas(...))` 및 `paths(...)` 섹션에 추가

use axum::{routing::get, Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error::ApiErrorResponse;
use crate::routes::{
    AssignRolesRequest, ComponentHealth, ComponentStatus, HealthResponse, LoginRequest,
    LoginResponse, RegisterRequest, ResourceResponse, UserSummary, UsersListResponse,
};

/// OpenAPI 문서 경로.
pub const OPENAPI_JSON_PATH: &str = "/api-docs/openapi.json";

/// Gatehouse API 문서.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Gatehouse API",
        description = r#"
# Gatehouse REST API

상태 없는 JWT 인증과 경로 기반 역할 인가를 제공합니다.

## 인증

`POST /api/auth/login`으로 받은 토큰을 `Authorization: Bearer <token>` 헤더에 포함하세요.

## 접근 규칙

- `/api/auth/**`: 공개
- `/api/resources/admin/**`: ADMIN
- `/api/resources/user/**`: USER 또는 ADMIN
- 그 외 `/api/**`: 인증된 모든 사용자
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "로컬 개발 서버"),
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "헬스 체크 - 서버 상태 확인"),
        (name = "auth", description = "인증 - 회원가입, 로그인"),
        (name = "resources", description = "리소스 - 역할별 보호 리소스"),
        (name = "admin", description = "관리자 - 사용자 계정 관리")
    ),
    components(
        schemas(
            // ===== Common =====
            ApiErrorResponse,

            // ===== Health =====
            HealthResponse,
            ComponentHealth,
            ComponentStatus,

            // ===== Auth =====
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            UserSummary,

            // ===== Resources =====
            ResourceResponse,

            // ===== Admin =====
            UsersListResponse,
            AssignRolesRequest,
        )
    ),
    paths(
        crate::routes::health::health_check,
        crate::routes::health::health_ready,

        crate::routes::auth::register,
        crate::routes::auth::login,

        crate::routes::resources::user_resource,
        crate::routes::resources::admin_resource,
        crate::routes::resources::me,

        crate::routes::admin::list_users,
        crate::routes::admin::assign_roles,
        crate::routes::admin::delete_user,
    )
)]
pub struct ApiDoc;

/// `bearer_auth` 보안 스킴 등록.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// OpenAPI JSON 라우터.
pub fn openapi_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(OPENAPI_JSON_PATH, get(|| async { Json(ApiDoc::openapi()) }))
}
