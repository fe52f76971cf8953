//! 인증 흐름.
//!
//! 로그인(자격 증명 확인 → 토큰 발급)과 회원가입, 관리자용 계정 작업을 담당합니다.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::{NewUser, Registration, Role, RoleSet, User};
use crate::error::{AccountError, AuthError, RegistrationError};
use crate::password::{PasswordEncoder, PasswordError};
use crate::store::CredentialStore;
use crate::token::{IssuedToken, TokenService};

/// 존재하지 않는 사용자에 대해 검증할 더미 비밀번호.
const DUMMY_PASSWORD: &str = "gatehouse-timing-equalizer";

/// 로그인 성공 결과.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: IssuedToken,
    pub user: User,
}

/// 인증 서비스.
///
/// 저장소, 인코더, 토큰 서비스는 생성자에서 주입받습니다.
pub struct AuthenticationService {
    store: Arc<dyn CredentialStore>,
    encoder: Arc<dyn PasswordEncoder>,
    tokens: Arc<TokenService>,
    default_roles: RoleSet,
    /// 사용자가 없을 때 비교할 해시 (응답 시간 균일화)
    dummy_hash: String,
}

impl std::fmt::Debug for AuthenticationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticationService")
            .field("tokens", &self.tokens)
            .field("default_roles", &self.default_roles)
            .finish_non_exhaustive()
    }
}

impl AuthenticationService {
    /// 새 인증 서비스 생성.
    ///
    /// 더미 해시를 만들기 위해 인코더를 한 번 호출합니다.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        encoder: Arc<dyn PasswordEncoder>,
        tokens: Arc<TokenService>,
        default_roles: RoleSet,
    ) -> Result<Self, PasswordError> {
        let dummy_hash = encoder.encode(DUMMY_PASSWORD)?;

        Ok(Self {
            store,
            encoder,
            tokens,
            default_roles,
            dummy_hash,
        })
    }

    pub fn tokens(&self) -> &Arc<TokenService> {
        &self.tokens
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn default_roles(&self) -> &RoleSet {
        &self.default_roles
    }

    /// 로그인.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        self.login_at(username, password, Utc::now()).await
    }

    /// 지정 시각 기준 로그인.
    ///
    /// 사용자가 없어도 더미 해시 검증을 수행하여 응답 시간으로 사용자 존재 여부가
    /// 드러나지 않게 합니다.
    pub async fn login_at(
        &self,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<LoginOutcome, AuthError> {
        let username = username.trim();

        let result = self.check_credentials(username, password).await;
        let user = match result {
            Ok(user) => user,
            Err(e) => {
                if e.is_credential_failure() {
                    warn!(username = %username, reason = e.reason(), "로그인 실패");
                } else {
                    warn!(username = %username, reason = e.reason(), error = %e, "로그인 처리 중 에러");
                }
                return Err(e);
            }
        };

        let token = self.tokens.issue(&user.username, &user.roles, now)?;
        info!(
            username = %user.username,
            roles = %user.roles,
            expires_at = %token.expires_at,
            "로그인 성공"
        );

        Ok(LoginOutcome { token, user })
    }

    async fn check_credentials(&self, username: &str, password: &str) -> Result<User, AuthError> {
        match self.store.find_by_username(username).await? {
            Some(user) => {
                if self.verify_password(password, user.password_hash.clone()).await? {
                    Ok(user)
                } else {
                    Err(AuthError::BadCredentials(username.to_string()))
                }
            }
            None => {
                // 결과는 버리고 시간만 소비
                let _ = self
                    .verify_password(password, self.dummy_hash.clone())
                    .await;
                Err(AuthError::NoSuchUser(username.to_string()))
            }
        }
    }

    /// 회원가입. 설정된 기본 역할을 부여합니다.
    pub async fn register(&self, registration: Registration) -> Result<User, RegistrationError> {
        let roles = self.default_roles.clone();
        let result = self.create_user(registration, roles).await;

        match &result {
            Ok(user) => info!(username = %user.username, roles = %user.roles, "회원가입 완료"),
            Err(RegistrationError::DuplicateUsername(username)) => {
                warn!(username = %username, reason = "duplicate_username", "회원가입 실패")
            }
            Err(e) => warn!(error = %e, "회원가입 실패"),
        }
        result
    }

    /// 시작 시 관리자 계정 생성.
    ///
    /// 이미 같은 이름이 있으면 아무것도 하지 않고 `None`을 반환합니다.
    pub async fn bootstrap_user(
        &self,
        registration: Registration,
    ) -> Result<Option<User>, RegistrationError> {
        let roles: RoleSet = [Role::user(), Role::admin()].into_iter().collect();

        match self.create_user(registration, roles).await {
            Ok(user) => {
                info!(username = %user.username, "부트스트랩 관리자 계정 생성");
                Ok(Some(user))
            }
            Err(RegistrationError::DuplicateUsername(username)) => {
                debug!(username = %username, "부트스트랩 관리자 계정이 이미 존재함");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn create_user(
        &self,
        registration: Registration,
        roles: RoleSet,
    ) -> Result<User, RegistrationError> {
        let Registration {
            username,
            password,
            email,
            name,
        } = registration;

        let username = username.trim().to_string();
        if username.is_empty() {
            return Err(RegistrationError::InvalidInput(
                "사용자 이름은 비어 있을 수 없습니다".into(),
            ));
        }
        if password.is_empty() {
            return Err(RegistrationError::InvalidInput(
                "비밀번호는 비어 있을 수 없습니다".into(),
            ));
        }

        // 해싱 비용을 치르기 전에 확인. 최종 고유성은 저장소 제약이 보장
        if self.store.find_by_username(&username).await?.is_some() {
            return Err(RegistrationError::DuplicateUsername(username));
        }

        let password_hash = self.hash_password(password).await?;

        let user = self
            .store
            .insert(NewUser {
                username,
                password_hash,
                email: email.trim().to_string(),
                name: name.trim().to_string(),
                roles,
            })
            .await?;

        Ok(user)
    }

    /// 전체 사용자 목록.
    pub async fn list_users(&self) -> Result<Vec<User>, AccountError> {
        Ok(self.store.list().await?)
    }

    /// 사용자의 역할 집합 교체.
    pub async fn assign_roles(&self, username: &str, roles: RoleSet) -> Result<User, AccountError> {
        if roles.is_empty() {
            return Err(AccountError::InvalidInput(
                "역할 집합은 비어 있을 수 없습니다".into(),
            ));
        }

        let user = self
            .store
            .update_roles(username, &roles)
            .await?
            .ok_or_else(|| AccountError::UserNotFound(username.to_string()))?;

        // 이미 발급된 토큰에는 반영되지 않음 (만료 후 재로그인 시 적용)
        info!(username = %username, roles = %roles, "역할 변경");
        Ok(user)
    }

    /// 사용자 삭제.
    pub async fn delete_user(&self, username: &str) -> Result<(), AccountError> {
        if !self.store.delete(username).await? {
            return Err(AccountError::UserNotFound(username.to_string()));
        }

        info!(username = %username, "사용자 삭제");
        Ok(())
    }

    async fn hash_password(&self, password: String) -> Result<String, PasswordError> {
        let encoder = self.encoder.clone();
        tokio::task::spawn_blocking(move || encoder.encode(&password))
            .await
            .map_err(|_| PasswordError::TaskFailed)?
    }

    async fn verify_password(&self, password: &str, hash: String) -> Result<bool, PasswordError> {
        let encoder = self.encoder.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || encoder.matches(&password, &hash))
            .await
            .map_err(|_| PasswordError::TaskFailed)?
    }
}
