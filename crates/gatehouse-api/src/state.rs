//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! Arc로 래핑되어 여러 요청 간에 공유됩니다. 토큰 서비스와 게이트는 생성 후 변경되지 않으므로
//! 잠금이 필요 없습니다.

use chrono::{DateTime, Utc};
use gatehouse_core::{
    AppConfig, Argon2PasswordEncoder, AuthenticationService, AuthorizationGate, ConfigError,
    CredentialStore, PasswordError, RoutePolicy, TokenError, TokenService,
};
use std::sync::Arc;

use crate::middleware::RateLimitState;

/// 상태 구성 에러.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("토큰 서비스 초기화 실패: {0}")]
    Token(#[from] TokenError),
    #[error("비밀번호 인코더 초기화 실패: {0}")]
    Password(#[from] PasswordError),
}

/// 애플리케이션 공유 상태.
#[derive(Clone)]
pub struct AppState {
    /// 회원가입/로그인/계정 관리
    pub auth: Arc<AuthenticationService>,

    /// 요청 인가 게이트
    pub gate: Arc<AuthorizationGate>,

    /// PostgreSQL 연결 풀 (없으면 메모리 저장소 사용 중)
    pub db_pool: Option<sqlx::PgPool>,

    /// 인증 엔드포인트 rate limit (비활성화 시 None)
    pub rate_limit: Option<RateLimitState>,

    /// 애플리케이션 버전
    pub version: String,

    /// 서버 시작 시간
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(auth: Arc<AuthenticationService>, gate: Arc<AuthorizationGate>) -> Self {
        Self {
            auth,
            gate,
            db_pool: None,
            rate_limit: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: Utc::now(),
        }
    }

    /// 설정과 저장소로 서비스 전체를 구성합니다.
    ///
    /// 토큰 서비스 하나를 인증 서비스와 게이트가 공유합니다.
    pub fn from_config(
        config: &AppConfig,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self, StateError> {
        let tokens = Arc::new(TokenService::from_config(&config.token)?);
        let encoder = Arc::new(Argon2PasswordEncoder::from_config(&config.password)?);

        let auth = AuthenticationService::new(
            store,
            encoder,
            tokens.clone(),
            config.default_roles()?,
        )?;

        let policy = RoutePolicy::contract().with_rules(config.extra_route_rules()?);
        let gate = AuthorizationGate::new(policy, tokens);

        Ok(Self::new(Arc::new(auth), Arc::new(gate)))
    }

    pub fn with_db_pool(mut self, pool: sqlx::PgPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitState) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    /// 서버 업타임(초).
    pub fn uptime_secs(&self) -> i64 {
        Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds()
    }

    /// 데이터베이스 연결 상태 확인.
    pub async fn is_db_healthy(&self) -> bool {
        match &self.db_pool {
            Some(pool) => sqlx::query("SELECT 1").fetch_one(pool).await.is_ok(),
            None => false,
        }
    }
}
