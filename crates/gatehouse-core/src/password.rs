//! 비밀번호 해싱.
//!
//! Argon2id 기반 해싱 및 상수 시간 검증.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

use crate::config::PasswordConfig;

/// 비밀번호 처리 에러.
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("비밀번호 해싱 실패")]
    HashingFailed,
    #[error("잘못된 해시 형식")]
    InvalidHashFormat,
    #[error("잘못된 해싱 파라미터: {0}")]
    InvalidParams(String),
    #[error("해싱 작업 실행 실패")]
    TaskFailed,
}

/// 단방향 비밀번호 인코더.
///
/// 구현체는 솔트를 포함한 느린 해시를 생성하고, 검증은 상수 시간으로 비교해야 합니다.
pub trait PasswordEncoder: Send + Sync {
    /// 평문 비밀번호를 해싱합니다.
    fn encode(&self, password: &str) -> Result<String, PasswordError>;

    /// 평문 비밀번호가 저장된 해시와 일치하는지 확인합니다.
    ///
    /// 해시 형식이 잘못된 경우에만 에러를 반환하고, 불일치는 `Ok(false)`입니다.
    fn matches(&self, password: &str, hash: &str) -> Result<bool, PasswordError>;
}

/// Argon2id 인코더.
#[derive(Debug, Clone)]
pub struct Argon2PasswordEncoder {
    params: Params,
}

impl Argon2PasswordEncoder {
    /// 파라미터를 지정하여 생성.
    ///
    /// # Arguments
    ///
    /// * `memory_kib` - 메모리 비용 (KiB)
    /// * `iterations` - 반복 횟수
    /// * `parallelism` - 병렬도
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, PasswordError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;
        Ok(Self { params })
    }

    pub fn from_config(config: &PasswordConfig) -> Result<Self, PasswordError> {
        Self::new(config.memory_kib, config.iterations, config.parallelism)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl Default for Argon2PasswordEncoder {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl PasswordEncoder for Argon2PasswordEncoder {
    fn encode(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);

        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|_| PasswordError::HashingFailed)?;

        Ok(hash.to_string())
    }

    fn matches(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHashFormat)?;

        // 해시 문자열에 기록된 파라미터로 검증
        match self.argon2().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(_) => Err(PasswordError::InvalidHashFormat),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 테스트용 저비용 인코더
    fn encoder() -> Argon2PasswordEncoder {
        Argon2PasswordEncoder::new(1024, 1, 1).unwrap()
    }

    #[test]
    fn test_hash_and_verify_password() {
        let encoder = encoder();
        let hash = encoder.encode("TestPassword123!").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(encoder.matches("TestPassword123!", &hash).unwrap());
        assert!(!encoder.matches("WrongPassword123!", &hash).unwrap());
    }

    #[test]
    fn test_different_salts_different_hashes() {
        let encoder = encoder();
        let hash1 = encoder.encode("Password1").unwrap();
        let hash2 = encoder.encode("Password1").unwrap();

        assert_ne!(hash1, hash2);
        assert!(encoder.matches("Password1", &hash1).unwrap());
        assert!(encoder.matches("Password1", &hash2).unwrap());
    }

    #[test]
    fn test_verify_uses_params_from_hash() {
        let strong = Argon2PasswordEncoder::new(2048, 2, 1).unwrap();
        let hash = strong.encode("pw123").unwrap();

        assert!(encoder().matches("pw123", &hash).unwrap());
    }

    #[test]
    fn test_invalid_hash_format() {
        let result = encoder().matches("password", "not-a-valid-hash");
        assert!(matches!(result, Err(PasswordError::InvalidHashFormat)));
    }

    #[test]
    fn test_invalid_params() {
        assert!(matches!(
            Argon2PasswordEncoder::new(1, 0, 0),
            Err(PasswordError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_unicode_password() {
        let encoder = encoder();
        let hash = encoder.encode("한글패스워드123").unwrap();
        assert!(encoder.matches("한글패스워드123", &hash).unwrap());
    }
}
