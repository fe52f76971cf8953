//! 설정 관리.
//!
//! 기본값 → 설정 파일(선택) → 환경 변수(`GATEHOUSE__...`) 순으로 덮어씁니다.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::net::IpAddr;
use std::path::Path;

use crate::domain::RoleSet;
use crate::gate::RouteRule;
use crate::token::TokenService;

/// 환경 변수 접두사.
pub const ENV_PREFIX: &str = "GATEHOUSE";

/// 기본 설정 파일 경로.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// 개발 환경용 서명 키. `token.allow_development_secret = true`일 때만 사용됩니다.
const DEVELOPMENT_SECRET: &str = "development-secret-key-change-in-production";

/// 설정 에러.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("설정 로드 실패: {0}")]
    Load(#[from] config::ConfigError),
    #[error("잘못된 설정: {0}")]
    Invalid(String),
}

/// 애플리케이션 설정.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub token: TokenConfig,
    pub password: PasswordConfig,
    pub security: SecurityConfig,
    pub gate: GateConfig,
    pub rate_limit: RateLimitSettings,
    pub logging: LoggingConfig,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 전역 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_secs: 30,
        }
    }
}

/// 데이터베이스 설정. `url`이 없으면 메모리 저장소로 동작합니다.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            connection_timeout_secs: 10,
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // URL에 비밀번호가 포함될 수 있음
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("max_connections", &self.max_connections)
            .field("connection_timeout_secs", &self.connection_timeout_secs)
            .finish()
    }
}

/// 토큰 서명 설정.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// HMAC 서명 키 (최소 32바이트)
    #[serde(deserialize_with = "deserialize_secret")]
    pub secret: SecretString,
    /// HS256 | HS384 | HS512
    pub algorithm: String,
    /// 토큰 유효 기간 (초)
    pub validity_secs: u64,
    /// `secret`이 비어 있을 때 소스에 공개된 개발용 키 사용을 허용
    pub allow_development_secret: bool,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: SecretString::new("".into()),
            algorithm: "HS256".to_string(),
            validity_secs: 24 * 60 * 60,
            allow_development_secret: false,
        }
    }
}

impl TokenConfig {
    /// 서명 키가 설정되지 않았는지 확인.
    pub fn is_secret_unset(&self) -> bool {
        self.secret.expose_secret().is_empty()
    }

    /// 키가 비어 있고 `allow_development_secret`이 켜져 있으면 개발용 키로 대체합니다.
    ///
    /// 대체가 일어났으면 `true`를 반환합니다.
    pub fn apply_development_fallback(&mut self) -> bool {
        if self.is_secret_unset() && self.allow_development_secret {
            self.secret = SecretString::new(DEVELOPMENT_SECRET.into());
            true
        } else {
            false
        }
    }
}

/// Argon2 파라미터.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        // argon2 크레이트 기본값 (OWASP 권장 최소치)
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// 가입/부트스트랩 정책.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// 신규 가입자에게 부여할 역할
    pub default_roles: Vec<String>,
    /// 시작 시 없으면 생성할 관리자 계정
    pub bootstrap_admin: Option<BootstrapAdminConfig>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            default_roles: vec!["USER".to_string()],
            bootstrap_admin: None,
        }
    }
}

/// 부트스트랩 관리자 계정.
#[derive(Debug, Deserialize)]
pub struct BootstrapAdminConfig {
    pub username: String,
    #[serde(deserialize_with = "deserialize_secret")]
    pub password: SecretString,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
}

/// 추가 라우트 규칙.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub rules: Vec<RouteRuleConfig>,
}

/// 설정 파일의 라우트 규칙 한 줄.
///
/// `access`: `public` | `authenticated` | `role` | `any_of` | `all_of`
#[derive(Debug, Clone, Deserialize)]
pub struct RouteRuleConfig {
    pub pattern: String,
    pub access: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// 인증 엔드포인트 rate limit 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub enabled: bool,
    /// 클라이언트 IP당 분당 요청 수
    pub requests_per_minute: u32,
    /// 순간 허용량
    pub burst_size: u32,
    /// `X-Forwarded-For`/`X-Real-IP`를 신뢰할 프록시 주소. 비어 있으면 연결 주소만 사용
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: 60,
            burst_size: 10,
            trusted_proxies: Vec::new(),
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨 필터
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "gatehouse_api=info,gatehouse_core=info,tower_http=info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(SecretString::new(raw.into()))
}

impl AppConfig {
    /// 설정 파일과 환경 변수에서 로드합니다. 파일이 없으면 건너뜁니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("security.default_roles")
                    .with_list_parse_key("rate_limit.trusted_proxies")
                    .try_parsing(true),
            );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// `GATEHOUSE_CONFIG` 또는 기본 경로에서 로드합니다.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path =
            std::env::var("GATEHOUSE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(path)
    }

    /// 가입 기본 역할 집합.
    pub fn default_roles(&self) -> Result<RoleSet, ConfigError> {
        let roles = RoleSet::parse(&self.security.default_roles)
            .map_err(|e| ConfigError::Invalid(format!("security.default_roles: {}", e)))?;
        if roles.is_empty() {
            return Err(ConfigError::Invalid(
                "security.default_roles는 비어 있을 수 없습니다".into(),
            ));
        }
        Ok(roles)
    }

    /// 설정된 추가 라우트 규칙.
    pub fn extra_route_rules(&self) -> Result<Vec<RouteRule>, ConfigError> {
        self.gate
            .rules
            .iter()
            .map(|rule| {
                RouteRule::try_from(rule)
                    .map_err(|e| ConfigError::Invalid(format!("gate.rules: {}", e)))
            })
            .collect()
    }

    /// 시작 전에 설정 값을 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token.is_secret_unset() {
            return Err(ConfigError::Invalid(
                "token.secret이 설정되지 않았습니다 (GATEHOUSE__TOKEN__SECRET)".into(),
            ));
        }
        TokenService::from_config(&self.token)
            .map_err(|e| ConfigError::Invalid(format!("token: {}", e)))?;
        self.default_roles()?;
        self.extra_route_rules()?;

        if self.server.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "server.request_timeout_secs는 0보다 커야 합니다".into(),
            ));
        }
        if let Some(admin) = &self.security.bootstrap_admin {
            if admin.username.trim().is_empty() || admin.password.expose_secret().is_empty() {
                return Err(ConfigError::Invalid(
                    "security.bootstrap_admin에는 username과 password가 필요합니다".into(),
                ));
            }
        }
        Ok(())
    }
}
