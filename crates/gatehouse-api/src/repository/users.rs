//! Users Repository
//!
//! PostgreSQL 기반 자격 증명 저장소. 사용자 이름 고유성은 `users_username_key`
//! 제약이 보장하며, 위반은 `StoreError::DuplicateUsername`으로 변환됩니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gatehouse_core::config::DatabaseConfig;
use gatehouse_core::{CredentialStore, NewUser, RoleSet, StoreError, User};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

// ================================================================================================
// Types
// ================================================================================================

/// 사용자 레코드 (역할 집계 포함)
#[derive(Debug, Clone, FromRow)]
struct UserRecord {
    id: Uuid,
    username: String,
    password_hash: String,
    email: String,
    name: String,
    roles: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRecord> for User {
    type Error = StoreError;

    fn try_from(record: UserRecord) -> Result<Self, Self::Error> {
        let roles = RoleSet::parse(&record.roles)
            .map_err(|e| StoreError::Backend(format!("저장된 역할이 잘못됨: {}", e)))?;

        Ok(User {
            id: record.id,
            username: record.username,
            password_hash: record.password_hash,
            email: record.email,
            name: record.name,
            roles,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

const SELECT_USERS: &str = r#"
    SELECT
        u.id, u.username, u.password_hash, u.email, u.name,
        COALESCE(
            array_agg(ur.role_name::TEXT ORDER BY ur.role_name)
                FILTER (WHERE ur.role_name IS NOT NULL),
            '{}'::TEXT[]
        ) AS roles,
        u.created_at, u.updated_at
    FROM users u
    LEFT JOIN user_roles ur ON ur.user_id = u.id
"#;

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

// ================================================================================================
// Repository
// ================================================================================================

/// PostgreSQL 자격 증명 저장소.
#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 설정으로 연결 풀 생성.
    pub async fn connect(url: &str, config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .connect(url)
            .await
    }

    /// 내장 마이그레이션 실행.
    pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    async fn fetch_user(&self, username: &str) -> Result<Option<User>, StoreError> {
        let query = format!("{} WHERE u.username = $1 GROUP BY u.id", SELECT_USERS);

        sqlx::query_as::<_, UserRecord>(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .map(User::try_from)
            .transpose()
    }

    /// 역할 링크 교체. 역할 테이블에 없는 이름은 먼저 등록합니다.
    async fn replace_roles(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        roles: &RoleSet,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut **tx)
            .await?;

        for role in roles {
            sqlx::query("INSERT INTO roles (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
                .bind(role.as_str())
                .execute(&mut **tx)
                .await?;

            sqlx::query("INSERT INTO user_roles (user_id, role_name) VALUES ($1, $2)")
                .bind(user_id)
                .bind(role.as_str())
                .execute(&mut **tx)
                .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.fetch_user(username).await
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let id = Uuid::new_v4();

        let inserted = sqlx::query(
            r#"
            INSERT INTO users (id, username, password_hash, email, name)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.email)
        .bind(&user.name)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(StoreError::DuplicateUsername(user.username));
            }
            Err(e) => return Err(backend(e)),
        }

        Self::replace_roles(&mut tx, id, &user.roles)
            .await
            .map_err(backend)?;
        tx.commit().await.map_err(backend)?;

        self.fetch_user(&user.username)
            .await?
            .ok_or_else(|| StoreError::Backend("삽입한 사용자를 찾을 수 없습니다".into()))
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let query = format!("{} GROUP BY u.id ORDER BY u.username", SELECT_USERS);

        sqlx::query_as::<_, UserRecord>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?
            .into_iter()
            .map(User::try_from)
            .collect()
    }

    async fn update_roles(
        &self,
        username: &str,
        roles: &RoleSet,
    ) -> Result<Option<User>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let user_id: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM users WHERE username = $1 FOR UPDATE")
                .bind(username)
                .fetch_optional(&mut *tx)
                .await
                .map_err(backend)?;

        let Some(user_id) = user_id else {
            return Ok(None);
        };

        Self::replace_roles(&mut tx, user_id, roles)
            .await
            .map_err(backend)?;

        sqlx::query("UPDATE users SET updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        tx.commit().await.map_err(backend)?;

        self.fetch_user(username).await
    }

    async fn delete(&self, username: &str) -> Result<bool, StoreError> {
        // user_roles는 ON DELETE CASCADE로 함께 삭제
        let result = sqlx::query("DELETE FROM users WHERE username = $1")
            .bind(username)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        Ok(result.rows_affected() > 0)
    }
}
