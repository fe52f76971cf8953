//! 인가 게이트 미들웨어와 인증 사용자 추출기.

use axum::{
    extract::{FromRequestParts, OriginalUri, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use gatehouse_core::{
    AuthorizationError, AuthorizationGate, GateDecision, GateRejection, Principal, Role,
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::metrics::record_gate_decision;

/// 모든 `/api` 요청 앞에서 게이트를 평가하는 미들웨어.
///
/// 통과하면 검증된 `Principal`을 request extension에 넣습니다.
pub async fn authorization_gate(
    State(gate): State<Arc<AuthorizationGate>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // 중첩 라우터 안에서도 접두사가 제거되기 전 경로로 판정
    let path = request
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.path().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    // ASCII가 아닌 헤더 값은 잘못된 헤더로 취급
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .map(|value| value.to_str().unwrap_or_default());

    match gate.authorize(&path, header, Utc::now()) {
        Ok(GateDecision::Bypass) => {
            record_gate_decision("bypass");
            Ok(next.run(request).await)
        }
        Ok(GateDecision::Allowed(principal)) => {
            record_gate_decision("allowed");
            debug!(path = %path, subject = %principal.subject, "요청 허용");

            request.extensions_mut().insert(principal);
            Ok(next.run(request).await)
        }
        Err(rejection) => {
            match &rejection {
                GateRejection::Unauthenticated(reason) => {
                    record_gate_decision("unauthenticated");
                    warn!(path = %path, reason = reason.as_str(), "인증 실패");
                }
                GateRejection::Forbidden(AuthorizationError::InsufficientRole {
                    required,
                    held,
                }) => {
                    record_gate_decision("forbidden");
                    warn!(
                        path = %path,
                        required = %required,
                        held = %held,
                        "권한 부족"
                    );
                }
            }
            Err(rejection.into())
        }
    }
}

/// 게이트를 통과한 호출자.
///
/// ```rust,ignore
/// async fn handler(CurrentUser(principal): CurrentUser) -> String {
///     principal.subject
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Principal);

impl CurrentUser {
    pub fn has_role(&self, role: &Role) -> bool {
        self.0.has_role(role)
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // 게이트 밖에 마운트된 핸들러라면 Principal이 없음
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(ApiError::unauthorized)
    }
}
