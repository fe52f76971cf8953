//! 인가 게이트.
//!
//! 요청 경로에 해당하는 규칙을 찾고, Bearer 토큰을 검증한 뒤 역할 요구사항을 평가합니다.
//!
//! ```text
//! 규칙 조회 ─ Public ──────────────────────────────▶ Bypass
//!     │
//!     └─ 토큰 추출 ─ 실패 ─▶ Unauthenticated (401)
//!            │
//!            └─ 검증 ─ 실패 ─▶ Unauthenticated (401)   (역할은 평가하지 않음)
//!                  │
//!                  └─ 역할 확인 ─ 불일치 ─▶ Forbidden (403)
//!                         │
//!                         └────────────────▶ Allowed(Principal)
//! ```

mod pattern;

pub use pattern::{normalize_path, PathPattern, PatternError, Specificity};

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

use crate::config::RouteRuleConfig;
use crate::domain::{InvalidRole, Principal, Role, RoleSet};
use crate::error::AuthorizationError;
use crate::token::{TokenService, VerificationError};

/// 역할 요구사항.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleRequirement {
    /// 특정 역할 하나
    Single(Role),
    /// 집합 중 하나 이상 (빈 집합이면 항상 거부)
    AnyOf(RoleSet),
    /// 집합 전부 (빈 집합이면 항상 허용)
    AllOf(RoleSet),
}

impl RoleRequirement {
    pub fn any_of(roles: impl IntoIterator<Item = Role>) -> Self {
        Self::AnyOf(roles.into_iter().collect())
    }

    pub fn all_of(roles: impl IntoIterator<Item = Role>) -> Self {
        Self::AllOf(roles.into_iter().collect())
    }

    pub fn is_satisfied_by(&self, held: &RoleSet) -> bool {
        match self {
            RoleRequirement::Single(role) => held.contains(role),
            RoleRequirement::AnyOf(roles) => held.intersects(roles),
            RoleRequirement::AllOf(roles) => held.is_superset(roles),
        }
    }
}

impl fmt::Display for RoleRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleRequirement::Single(role) => write!(f, "{}", role),
            RoleRequirement::AnyOf(roles) => write!(f, "any of {}", roles),
            RoleRequirement::AllOf(roles) => write!(f, "all of {}", roles),
        }
    }
}

/// 라우트 접근 수준.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// 게이트 우회
    Public,
    /// 유효한 토큰이면 누구나
    Authenticated,
    /// 역할 요구사항 충족 필요
    Require(RoleRequirement),
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Public => f.write_str("public"),
            Access::Authenticated => f.write_str("authenticated"),
            Access::Require(req) => write!(f, "require {}", req),
        }
    }
}

/// 라우트 규칙 설정 에러.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error(transparent)]
    Pattern(#[from] PatternError),
    #[error(transparent)]
    Role(#[from] InvalidRole),
    #[error("알 수 없는 접근 수준: {0}")]
    UnknownAccess(String),
    #[error("'{0}' 규칙에는 역할이 필요합니다")]
    MissingRoles(String),
    #[error("'role' 규칙에는 역할이 정확히 하나 있어야 합니다")]
    SingleRoleExpected,
}

/// 경로 패턴과 접근 수준의 쌍.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    pattern: PathPattern,
    access: Access,
}

impl RouteRule {
    pub fn new(pattern: &str, access: Access) -> Result<Self, RuleError> {
        Ok(Self {
            pattern: PathPattern::parse(pattern)?,
            access,
        })
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn access(&self) -> &Access {
        &self.access
    }
}

impl TryFrom<&RouteRuleConfig> for RouteRule {
    type Error = RuleError;

    fn try_from(config: &RouteRuleConfig) -> Result<Self, Self::Error> {
        let roles = RoleSet::parse(&config.roles)?;
        let kind = config.access.trim().to_ascii_lowercase();

        let access = match kind.as_str() {
            "public" => Access::Public,
            "authenticated" => Access::Authenticated,
            "role" => {
                let mut iter = roles.iter();
                match (iter.next(), iter.next()) {
                    (Some(role), None) => Access::Require(RoleRequirement::Single(role.clone())),
                    _ => return Err(RuleError::SingleRoleExpected),
                }
            }
            "any_of" | "all_of" if roles.is_empty() => return Err(RuleError::MissingRoles(kind)),
            "any_of" => Access::Require(RoleRequirement::AnyOf(roles)),
            "all_of" => Access::Require(RoleRequirement::AllOf(roles)),
            _ => return Err(RuleError::UnknownAccess(config.access.clone())),
        };

        RouteRule::new(&config.pattern, access)
    }
}

/// 경로 → 접근 수준 테이블.
///
/// 여러 규칙이 매칭되면 가장 구체적인 패턴이 이기고, 같으면 먼저 선언된 규칙이 이깁니다.
/// 어떤 규칙에도 매칭되지 않는 경로는 인증을 요구합니다.
#[derive(Debug, Clone)]
pub struct RoutePolicy {
    rules: Vec<RouteRule>,
}

impl RoutePolicy {
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self { rules }
    }

    /// 기본 라우트 계약.
    ///
    /// | 패턴 | 접근 |
    /// |------|------|
    /// | `/api/auth/**` | 공개 |
    /// | `/api/resources/admin/**` | ADMIN |
    /// | `/api/resources/user/**` | USER 또는 ADMIN |
    /// | `/api/**` | 인증된 사용자 |
    pub fn contract() -> Self {
        fn rule(segments: &[&str], access: Access) -> RouteRule {
            RouteRule {
                pattern: PathPattern::literal(segments, true),
                access,
            }
        }

        Self::new(vec![
            rule(&["api", "auth"], Access::Public),
            rule(
                &["api", "resources", "admin"],
                Access::Require(RoleRequirement::Single(Role::admin())),
            ),
            rule(
                &["api", "resources", "user"],
                Access::Require(RoleRequirement::any_of([Role::user(), Role::admin()])),
            ),
            rule(&["api"], Access::Authenticated),
        ])
    }

    /// 규칙 추가. 기존 규칙과 구체성이 같으면 기존 규칙이 우선합니다.
    pub fn with_rules(mut self, rules: impl IntoIterator<Item = RouteRule>) -> Self {
        self.rules.extend(rules);
        self
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    /// 경로에 적용될 규칙 조회.
    pub fn resolve(&self, path: &str) -> Option<&RouteRule> {
        let segments = normalize_path(path);

        let mut best: Option<&RouteRule> = None;
        for rule in self.rules.iter().filter(|r| r.pattern.matches(&segments)) {
            match best {
                Some(current) if current.pattern.specificity() >= rule.pattern.specificity() => {}
                _ => best = Some(rule),
            }
        }
        best
    }

    /// 경로의 접근 수준.
    pub fn access_for(&self, path: &str) -> &Access {
        self.resolve(path)
            .map(RouteRule::access)
            .unwrap_or(&Access::Authenticated)
    }
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self::contract()
    }
}

/// 게이트 통과 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// 공개 라우트 - 토큰을 보지 않음
    Bypass,
    /// 검증된 호출자
    Allowed(Principal),
}

/// 인증 실패 원인 (로그 전용).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnauthenticatedReason {
    MissingToken,
    MalformedHeader,
    Verification(VerificationError),
}

impl UnauthenticatedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnauthenticatedReason::MissingToken => "missing_token",
            UnauthenticatedReason::MalformedHeader => "malformed_header",
            UnauthenticatedReason::Verification(e) => e.reason(),
        }
    }
}

/// 게이트 거부.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateRejection {
    /// 401
    #[error("인증 실패: {}", .0.as_str())]
    Unauthenticated(UnauthenticatedReason),
    /// 403
    #[error(transparent)]
    Forbidden(#[from] AuthorizationError),
}

impl From<VerificationError> for GateRejection {
    fn from(err: VerificationError) -> Self {
        GateRejection::Unauthenticated(UnauthenticatedReason::Verification(err))
    }
}

/// `Authorization` 헤더에서 Bearer 토큰 추출.
///
/// 스킴은 대소문자를 구분하지 않습니다.
pub fn extract_bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();

    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// 인가 게이트.
///
/// 상태가 없으므로 `Arc`로 공유하여 모든 요청에서 동시에 사용합니다.
#[derive(Debug, Clone)]
pub struct AuthorizationGate {
    policy: Arc<RoutePolicy>,
    tokens: Arc<TokenService>,
}

impl AuthorizationGate {
    pub fn new(policy: RoutePolicy, tokens: Arc<TokenService>) -> Self {
        Self {
            policy: Arc::new(policy),
            tokens,
        }
    }

    pub fn policy(&self) -> &RoutePolicy {
        &self.policy
    }

    /// 요청 하나를 평가합니다.
    ///
    /// # Arguments
    ///
    /// * `path` - 요청 경로 (쿼리 제외)
    /// * `authorization` - `Authorization` 헤더 값
    /// * `now` - 만료 판정 기준 시각
    pub fn authorize(
        &self,
        path: &str,
        authorization: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<GateDecision, GateRejection> {
        let access = self.policy.access_for(path);
        if *access == Access::Public {
            return Ok(GateDecision::Bypass);
        }

        let header = authorization
            .ok_or(GateRejection::Unauthenticated(UnauthenticatedReason::MissingToken))?;
        let token = extract_bearer(header)
            .ok_or(GateRejection::Unauthenticated(UnauthenticatedReason::MalformedHeader))?;

        let principal = self.tokens.verify(token, now)?;

        if let Access::Require(requirement) = access {
            if !requirement.is_satisfied_by(&principal.roles) {
                return Err(AuthorizationError::InsufficientRole {
                    required: requirement.clone(),
                    held: principal.roles,
                }
                .into());
            }
        }

        Ok(GateDecision::Allowed(principal))
    }
}
