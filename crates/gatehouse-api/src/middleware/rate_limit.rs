//! Rate limiting middleware.
//!
//! 인증 엔드포인트(`/api/auth/**`)에 대한 클라이언트 IP별 Token Bucket 제한.
//! 비밀번호 대입 시도를 늦추는 용도입니다.
//!
//! 클라이언트 IP는 연결 주소입니다. 연결 주소가 `trusted_proxies`에 있을 때만
//! 전달 헤더를 읽습니다.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use gatehouse_core::config::RateLimitSettings;
use metrics::counter;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::ApiErrorResponse;

/// Rate Limiter 설정.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// 분당 최대 요청 수
    pub requests_per_minute: u32,
    /// 버스트 허용량
    pub burst_size: u32,
    /// 이 시간 동안 사용되지 않은 버킷은 정리 대상
    pub cleanup_interval: Duration,
    /// 전달 헤더를 신뢰할 프록시 주소
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            burst_size: 10,
            cleanup_interval: Duration::from_secs(60),
            trusted_proxies: Vec::new(),
        }
    }
}

impl From<&RateLimitSettings> for RateLimitConfig {
    fn from(settings: &RateLimitSettings) -> Self {
        Self {
            requests_per_minute: settings.requests_per_minute.max(1),
            burst_size: settings.burst_size,
            trusted_proxies: settings.trusted_proxies.clone(),
            ..Default::default()
        }
    }
}

/// Token Bucket.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    max_tokens: f64,
    /// 초당 리필 토큰 수
    refill_rate: f64,
}

impl TokenBucket {
    fn new(config: &RateLimitConfig) -> Self {
        let refill_rate = config.requests_per_minute as f64 / 60.0;
        let max_tokens = refill_rate + config.burst_size as f64;

        Self {
            tokens: max_tokens,
            last_refill: Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    fn try_acquire(&mut self) -> bool {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();

        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;
    }

    /// 다음 토큰까지 대기 시간 (초).
    fn time_until_next_token(&self) -> f64 {
        if self.tokens >= 1.0 {
            0.0
        } else {
            (1.0 - self.tokens) / self.refill_rate
        }
    }
}

/// Rate Limit 확인 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    Allowed,
    Limited {
        /// 재시도까지 대기 시간 (초)
        retry_after: u64,
    },
}

/// IP 주소별 Rate Limiter.
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: Arc<RwLock<HashMap<IpAddr, TokenBucket>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// 요청 허용 여부 확인.
    pub async fn check(&self, ip: IpAddr) -> RateLimitResult {
        let mut buckets = self.buckets.write().await;

        let bucket = buckets
            .entry(ip)
            .or_insert_with(|| TokenBucket::new(&self.config));

        if bucket.try_acquire() {
            RateLimitResult::Allowed
        } else {
            let retry_after = bucket.time_until_next_token().ceil().max(1.0) as u64;
            RateLimitResult::Limited { retry_after }
        }
    }

    /// 오래된 버킷 정리.
    pub async fn cleanup(&self) {
        let mut buckets = self.buckets.write().await;
        let Some(threshold) = Instant::now().checked_sub(self.config.cleanup_interval) else {
            return;
        };

        buckets.retain(|_, bucket| bucket.last_refill > threshold);
    }

    /// 현재 추적 중인 IP 수.
    pub async fn tracked_ips(&self) -> usize {
        self.buckets.read().await.len()
    }

    /// 주기적으로 버킷을 정리하는 백그라운드 태스크 시작.
    ///
    /// `shutdown`이 취소되면 종료합니다.
    pub fn spawn_cleanup(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let limiter = self.clone();
        let period = self.config.cleanup_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::debug!("Rate limit cleanup task stopped");
                        break;
                    }
                    _ = interval.tick() => limiter.cleanup().await,
                }
            }
        })
    }
}

/// Rate Limit 미들웨어 상태.
#[derive(Clone)]
pub struct RateLimitState {
    limiter: RateLimiter,
}

impl RateLimitState {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            limiter: RateLimiter::new(config),
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// 요청의 클라이언트 IP.
    pub fn client_ip(&self, request: &Request) -> IpAddr {
        extract_client_ip(request, &self.limiter.config.trusted_proxies)
    }
}

/// Rate Limiting 미들웨어 함수.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    let ip = state.client_ip(&request);

    match state.limiter.check(ip).await {
        RateLimitResult::Allowed => {
            counter!("rate_limit_requests_total", "status" => "allowed").increment(1);
            next.run(request).await
        }
        RateLimitResult::Limited { retry_after } => {
            counter!("rate_limit_requests_total", "status" => "limited").increment(1);

            tracing::warn!(
                client_ip = %ip,
                path = %request.uri().path(),
                retry_after = retry_after,
                "Rate limit exceeded"
            );

            let body = ApiErrorResponse::with_details(
                "RATE_LIMITED",
                "요청이 너무 많습니다. 잠시 후 다시 시도하세요.",
                serde_json::json!({ "retry_after": retry_after }),
            );
            let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after));

            response
        }
    }
}

/// 요청에서 클라이언트 IP 추출.
///
/// 연결 주소가 신뢰하는 프록시일 때만 `X-Forwarded-For`를 오른쪽부터 읽어 신뢰하지 않는
/// 첫 주소를 사용하고, 없으면 `X-Real-IP`를 봅니다. 연결 정보가 없으면 loopback으로 간주합니다.
fn extract_client_ip(request: &Request, trusted_proxies: &[IpAddr]) -> IpAddr {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

    if !trusted_proxies.contains(&peer) {
        return peer;
    }

    let header = |name: &str| request.headers().get(name).and_then(|v| v.to_str().ok());

    let forwarded = header("x-forwarded-for").and_then(|chain| {
        chain
            .rsplit(',')
            .filter_map(|hop| hop.trim().parse::<IpAddr>().ok())
            .find(|hop| !trusted_proxies.contains(hop))
    });

    forwarded
        .or_else(|| header("x-real-ip").and_then(|v| v.trim().parse::<IpAddr>().ok()))
        .unwrap_or(peer)
}
