//! JWT 토큰 서비스.
//!
//! 상태 없는 서명 토큰의 발급과 검증. 검증 중에는 저장소를 조회하지 않습니다.

use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::TokenConfig;
use crate::domain::{Principal, RoleSet};

/// JWT 페이로드.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - 사용자 이름
    pub sub: String,
    /// 정규형 역할 이름 목록
    pub roles: Vec<String>,
    /// Issued At (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
    /// JWT ID - 토큰 고유 식별자
    pub jti: String,
}

/// 발급된 토큰.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// 인코딩된 JWT 문자열
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// 토큰 검증 실패.
///
/// 서명 검사가 만료 검사보다 먼저 수행되므로, 만료된 토큰이라도 키가 다르면
/// `InvalidSignature`가 됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("서명이 일치하지 않습니다")]
    InvalidSignature,
    #[error("토큰이 만료되었습니다")]
    Expired,
    #[error("잘못된 토큰 형식")]
    Malformed,
}

impl VerificationError {
    pub fn reason(&self) -> &'static str {
        match self {
            VerificationError::InvalidSignature => "invalid_signature",
            VerificationError::Expired => "expired",
            VerificationError::Malformed => "malformed",
        }
    }
}

/// 토큰 서비스 생성/발급 에러.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("토큰 인코딩 실패: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),
    #[error("서명 키 설정 오류: {0}")]
    InvalidKey(String),
    #[error("지원하지 않는 알고리즘: {0}")]
    UnsupportedAlgorithm(String),
    #[error("만료 시각 계산 실패")]
    Timestamp,
}

/// 토큰 발급/검증 서비스.
///
/// 서명 키는 생성 시 한 번 로드되고 이후 변경되지 않습니다.
/// `Arc`로 공유하면 잠금 없이 동시 요청에서 사용할 수 있습니다.
pub struct TokenService {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    validity: Duration,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("algorithm", &self.algorithm)
            .field("validity", &self.validity)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// HMAC 키 최소 길이 (바이트).
    pub const MIN_SECRET_LEN: usize = 32;

    /// 새 토큰 서비스 생성.
    ///
    /// # Arguments
    ///
    /// * `secret` - HMAC 서명 키 (최소 32바이트)
    /// * `algorithm` - HS256 / HS384 / HS512
    /// * `validity` - 토큰 유효 기간
    pub fn new(
        secret: &SecretString,
        algorithm: Algorithm,
        validity: Duration,
    ) -> Result<Self, TokenError> {
        if !matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(TokenError::UnsupportedAlgorithm(format!("{:?}", algorithm)));
        }

        let secret = secret.expose_secret().as_bytes();
        if secret.len() < Self::MIN_SECRET_LEN {
            return Err(TokenError::InvalidKey(format!(
                "키는 최소 {}바이트여야 합니다",
                Self::MIN_SECRET_LEN
            )));
        }
        if validity <= Duration::zero() {
            return Err(TokenError::InvalidKey("유효 기간은 0보다 커야 합니다".into()));
        }

        // 만료는 호출자가 넘긴 `now` 기준으로 직접 검사
        let mut validation = Validation::new(algorithm);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "iat", "exp"]);

        Ok(Self {
            algorithm,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            validity,
        })
    }

    /// 설정에서 토큰 서비스 생성.
    pub fn from_config(config: &TokenConfig) -> Result<Self, TokenError> {
        let algorithm = config
            .algorithm
            .parse::<Algorithm>()
            .map_err(|_| TokenError::UnsupportedAlgorithm(config.algorithm.clone()))?;

        Self::new(
            &config.secret,
            algorithm,
            Duration::seconds(config.validity_secs as i64),
        )
    }

    /// 토큰 유효 기간.
    pub fn validity(&self) -> Duration {
        self.validity
    }

    /// 토큰 발급.
    ///
    /// issued-at = `now`, expiry = `now + validity`. JWT 시각은 초 단위이므로 `now`의
    /// 초 미만 부분은 버리고, 반환하는 시각은 토큰에 담긴 값과 같습니다.
    pub fn issue(
        &self,
        subject: &str,
        roles: &RoleSet,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let now = now.with_nanosecond(0).ok_or(TokenError::Timestamp)?;
        let expires_at = now
            .checked_add_signed(self.validity)
            .ok_or(TokenError::Timestamp)?;

        let claims = Claims {
            sub: subject.to_string(),
            roles: roles.names(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding_key)?;

        Ok(IssuedToken {
            token,
            issued_at: now,
            expires_at,
        })
    }

    /// 토큰 검증.
    ///
    /// 서명 → 페이로드 → 만료 순서로 검사하며, 성공 시 포함된 subject와 역할을 그대로 반환합니다.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Principal, VerificationError> {
        let claims = self.decode_claims(token)?;

        let expires_at = Self::expiry_of(&claims).ok_or(VerificationError::Malformed)?;
        if now > expires_at {
            return Err(VerificationError::Expired);
        }

        if claims.sub.is_empty() {
            return Err(VerificationError::Malformed);
        }
        let roles = RoleSet::parse(&claims.roles).map_err(|_| VerificationError::Malformed)?;

        Ok(Principal::new(claims.sub, roles))
    }

    /// 서명만 검증하고 Claims 반환 (만료 미검사).
    pub fn decode_claims(&self, token: &str) -> Result<Claims, VerificationError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    VerificationError::InvalidSignature
                }
                ErrorKind::ExpiredSignature => VerificationError::Expired,
                _ => VerificationError::Malformed,
            })
    }

    /// Claims의 만료 시각.
    pub fn expiry_of(claims: &Claims) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(claims.exp, 0).single()
    }
}
