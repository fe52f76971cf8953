//! Gatehouse API 서버.
//!
//! 설정을 로드하고 Axum 서버를 시작합니다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use secrecy::ExposeSecret;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use gatehouse_api::metrics::setup_metrics_recorder;
use gatehouse_api::middleware::{metrics_layer, RateLimitConfig, RateLimitState};
use gatehouse_api::openapi::openapi_router;
use gatehouse_api::repository::PgCredentialStore;
use gatehouse_api::routes::{create_api_router, create_health_router};
use gatehouse_api::state::AppState;
use gatehouse_core::logging::{init_logging, LogConfig};
use gatehouse_core::{AppConfig, CredentialStore, InMemoryCredentialStore, Registration};

/// CORS 미들웨어 구성.
///
/// `CORS_ORIGINS`(쉼표 구분)가 설정되어 있으면 해당 origin만 허용하고,
/// 없으면 개발 모드로 간주하여 모든 origin을 허용합니다.
fn cors_layer() -> CorsLayer {
    let allow_origin = match std::env::var("CORS_ORIGINS") {
        Ok(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();

            if origins.is_empty() {
                warn!("CORS_ORIGINS is set but contains no valid origins, allowing any");
                AllowOrigin::any()
            } else {
                info!("CORS configured with {} allowed origins", origins.len());
                AllowOrigin::list(origins)
            }
        }
        _ => {
            warn!("CORS_ORIGINS not set, allowing any origin (development mode)");
            AllowOrigin::any()
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
        ])
        .max_age(Duration::from_secs(3600))
}

/// /metrics 엔드포인트 핸들러.
async fn metrics_handler(
    axum::extract::State(handle): axum::extract::State<PrometheusHandle>,
) -> String {
    handle.render()
}

/// 전체 라우터 생성.
fn create_router(
    state: Arc<AppState>,
    metrics_handle: PrometheusHandle,
    request_timeout: Duration,
) -> Router {
    // 메트릭 라우터 (별도 상태, 게이트 제외)
    let metrics_router = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics_handle);

    Router::new()
        .merge(metrics_router)
        .merge(create_health_router(state.clone()))
        .merge(create_api_router(state))
        .merge(openapi_router())
        .layer(middleware::from_fn(metrics_layer))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(cors_layer())
}

/// OpenAPI 스펙 내보내기 처리.
///
/// `--export-openapi` 플래그 또는 `EXPORT_OPENAPI` 환경변수가 설정된 경우
/// OpenAPI JSON 스펙을 stdout으로 출력하고 종료합니다.
fn handle_export_openapi() -> Result<(), Box<dyn std::error::Error>> {
    use gatehouse_api::openapi::ApiDoc;
    use utoipa::OpenApi as _;

    let export_flag = std::env::args().any(|arg| arg == "--export-openapi");
    let export_env = std::env::var("EXPORT_OPENAPI")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    if export_flag || export_env {
        let json = serde_json::to_string_pretty(&ApiDoc::openapi())?;
        println!("{}", json);
        std::process::exit(0);
    }

    Ok(())
}

/// 자격 증명 저장소 선택.
///
/// `database.url`이 없으면 메모리 저장소로 동작합니다 (재시작 시 데이터 소실).
async fn create_store(
    config: &AppConfig,
) -> Result<(Arc<dyn CredentialStore>, Option<sqlx::PgPool>), Box<dyn std::error::Error>> {
    let Some(url) = config.database.url.as_deref() else {
        warn!("database.url not set, using in-memory credential store (demo mode)");
        return Ok((Arc::new(InMemoryCredentialStore::new()), None));
    };

    let pool = PgCredentialStore::connect(url, &config.database)
        .await
        .map_err(|e| {
            error!(error = %e, "데이터베이스 연결 실패");
            e
        })?;
    PgCredentialStore::migrate(&pool).await?;
    info!("Connected to PostgreSQL");

    Ok((Arc::new(PgCredentialStore::new(pool.clone())), Some(pool)))
}

/// 설정된 부트스트랩 관리자 계정 생성.
async fn bootstrap_admin(
    config: &AppConfig,
    state: &AppState,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(admin) = &config.security.bootstrap_admin else {
        return Ok(());
    };

    let registration = Registration {
        username: admin.username.clone(),
        password: admin.password.expose_secret().to_string(),
        email: admin.email.clone(),
        name: admin.name.clone(),
    };
    state.auth.bootstrap_user(registration).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    // OpenAPI 내보내기 처리 (서버 시작 전)
    handle_export_openapi()?;

    let mut config = AppConfig::load_default()?;

    init_logging(LogConfig::from_settings(&config.logging).with_env_overrides())?;
    info!("Starting Gatehouse API server...");

    if config.token.apply_development_fallback() {
        warn!("token.secret not set, using development secret (INSECURE for development only)");
    }
    config.validate().map_err(|e| {
        error!(error = %e, "설정 검증 실패");
        e
    })?;

    let metrics_handle = setup_metrics_recorder()?;
    info!("Prometheus metrics recorder initialized");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| {
            error!(
                host = %config.server.host,
                port = config.server.port,
                "소켓 주소 설정이 유효하지 않습니다. server.host, server.port를 확인하세요."
            );
            e
        })?;

    let (store, db_pool) = create_store(&config).await?;

    let mut state = AppState::from_config(&config, store)?;
    if let Some(pool) = db_pool {
        state = state.with_db_pool(pool);
    }

    // 전역 종료 토큰 (백그라운드 태스크 종료 전파용)
    let shutdown_token = CancellationToken::new();

    if config.rate_limit.enabled {
        let rate_limit = RateLimitState::new(RateLimitConfig::from(&config.rate_limit));
        rate_limit.limiter().spawn_cleanup(shutdown_token.clone());
        info!(
            requests_per_minute = config.rate_limit.requests_per_minute,
            burst_size = config.rate_limit.burst_size,
            "Rate limiting enabled for /api/auth"
        );
        state = state.with_rate_limit(rate_limit);
    } else {
        info!("Rate limiting DISABLED");
    }

    bootstrap_admin(&config, &state).await?;

    let state = Arc::new(state);
    info!(
        version = %state.version,
        has_db = state.db_pool.is_some(),
        extra_rules = config.gate.rules.len(),
        "Application state initialized"
    );

    let app = create_router(
        state,
        metrics_handle,
        Duration::from_secs(config.server.request_timeout_secs),
    );

    info!(%addr, "API server listening");
    info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);
    info!("Metrics available at http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown_token.clone()))
    .await?;

    // 백그라운드 태스크에 종료 전파
    shutdown_token.cancel();
    info!("Server stopped gracefully");

    Ok(())
}

/// Graceful shutdown 시그널 대기.
///
/// Ctrl+C 또는 SIGTERM 시그널을 수신하면 종료 토큰을 취소합니다.
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    shutdown_token.cancel();
    info!("Shutdown signal propagated to background tasks");
}
