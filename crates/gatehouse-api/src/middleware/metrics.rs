//! HTTP 요청 metrics middleware.

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::metrics::{record_http_duration, record_http_request, record_http_response};

/// 매칭된 라우트가 없는 요청의 path 라벨.
pub const UNMATCHED_PATH: &str = "unmatched";

/// 메트릭 path 라벨.
///
/// 라우트 템플릿(`/api/resources/admin/users/{username}/roles`)을 사용하므로 라벨 수는
/// 등록된 라우트 수로 제한됩니다.
pub fn path_label(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_PATH.to_string())
}

/// HTTP 메트릭을 수집하는 미들웨어 레이어.
///
/// - `http_requests_total`: 총 요청 수 (method, path 라벨)
/// - `http_responses_total`: 총 응답 수 (method, path, status 라벨)
/// - `http_request_duration_seconds`: 요청 처리 시간 히스토그램
pub async fn metrics_layer(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().to_string();
    let path = path_label(&request);

    record_http_request(&method, &path);

    let response = next.run(request).await;

    let status = response.status().as_u16();
    record_http_response(&method, &path, status);
    record_http_duration(&method, &path, start.elapsed().as_secs_f64());

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    async fn test_handler() -> &'static str {
        "OK"
    }

    /// 계산된 라벨을 응답 헤더로 돌려주는 레이어.
    async fn echo_label(request: axum::extract::Request, next: Next) -> Response {
        let label = path_label(&request);
        let mut response = next.run(request).await;
        response
            .headers_mut()
            .insert("x-path-label", label.parse().unwrap());
        response
    }

    fn app() -> Router {
        let users = Router::new().route("/users/{username}", get(test_handler));
        Router::new()
            .nest("/api", users)
            .layer(middleware::from_fn(echo_label))
            .layer(middleware::from_fn(metrics_layer))
    }

    async fn label_for(uri: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        let label = response.headers()["x-path-label"].to_str().unwrap().to_string();
        (response.status(), label)
    }

    #[tokio::test]
    async fn test_label_uses_route_template() {
        let (status, label) = label_for("/api/users/alice").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(label, "/api/users/{username}");

        let (_, other) = label_for("/api/users/bob").await;
        assert_eq!(other, label);
    }

    #[tokio::test]
    async fn test_unmatched_paths_share_one_label() {
        for uri in ["/random-scan-1", "/wp-admin/x.php"] {
            let (status, label) = label_for(uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(label, UNMATCHED_PATH);
        }
    }
}
