//! Gatehouse REST API 서버.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - Axum 기반 REST API (회원가입, 로그인, 보호 리소스, 계정 관리)
//! - 모든 `/api` 요청 앞의 인가 게이트 미들웨어
//! - PostgreSQL 자격 증명 저장소
//! - 헬스 체크, Prometheus 메트릭, OpenAPI 문서
//!
//! # 모듈 구성
//!
//! - [`state`]: 애플리케이션 공유 상태 (AppState)
//! - [`routes`]: REST API 엔드포인트
//! - [`auth`]: 인가 게이트 미들웨어와 호출자 추출기
//! - [`repository`]: PostgreSQL 저장소
//! - [`metrics`]: Prometheus 메트릭 수집
//! - [`middleware`]: HTTP 미들웨어
//! - [`openapi`]: OpenAPI 문서

pub mod auth;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod openapi;
pub mod repository;
pub mod routes;
pub mod state;

pub use auth::{authorization_gate, CurrentUser};
pub use error::{ApiError, ApiErrorResponse, ApiResult};
pub use metrics::setup_metrics_recorder;
pub use middleware::metrics_layer;
pub use repository::PgCredentialStore;
pub use routes::{create_api_router, create_health_router};
pub use state::{AppState, StateError};
