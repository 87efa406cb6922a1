//! PostgreSQL action token repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use finrecon_common::{TokenId, UserId};
use finrecon_errors::{AppError, AppResult};
use sqlx::PgPool;
use uuid::Uuid;

use super::error_mapper::map_sqlx_error;
use crate::domain::token::{ActionToken, ActionTokenRepository, TokenPurpose};

pub struct PostgresActionTokenRepository {
    pool: PgPool,
}

impl PostgresActionTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActionTokenRepository for PostgresActionTokenRepository {
    async fn insert(&self, token: &ActionToken) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO auth_action_tokens
                (id, user_id, email, purpose, token_hash, token_salt, expires_at,
                 consumed_at, attempt_count, created_at, created_ip, last_attempt_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(token.id.0)
        .bind(token.user_id.as_ref().map(|u| u.0))
        .bind(&token.email)
        .bind(token.purpose.as_str())
        .bind(&token.token_hash)
        .bind(&token.token_salt)
        .bind(token.expires_at)
        .bind(token.consumed_at)
        .bind(token.attempt_count)
        .bind(token.created_at)
        .bind(&token.created_ip)
        .bind(token.last_attempt_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_purpose_and_hash(
        &self,
        purpose: TokenPurpose,
        token_hash: &[u8],
    ) -> AppResult<Option<ActionToken>> {
        let row = sqlx::query_as::<_, ActionTokenRow>(
            r#"
            SELECT id, user_id, email, purpose, token_hash, token_salt, expires_at,
                   consumed_at, attempt_count, created_at, created_ip, last_attempt_at
            FROM auth_action_tokens
            WHERE purpose = $1 AND token_hash = $2
            "#,
        )
        .bind(purpose.as_str())
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(ActionTokenRow::into_token).transpose()
    }

    async fn has_recent_unconsumed(
        &self,
        email: &str,
        purpose: TokenPurpose,
        since: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM auth_action_tokens
                WHERE email = $1 AND purpose = $2
                AND consumed_at IS NULL AND created_at >= $3
            )
            "#,
        )
        .bind(email)
        .bind(purpose.as_str())
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.0)
    }

    async fn register_attempt(&self, id: &TokenId, at: DateTime<Utc>) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE auth_action_tokens
            SET attempt_count = attempt_count + 1, last_attempt_at = $2
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn mark_consumed(&self, id: &TokenId, at: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE auth_action_tokens
            SET consumed_at = $2, last_attempt_at = $2
            WHERE id = $1 AND consumed_at IS NULL
            "#,
        )
        .bind(id.0)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }
}

// ============ Row mapping ============

#[derive(sqlx::FromRow)]
struct ActionTokenRow {
    id: Uuid,
    user_id: Option<Uuid>,
    email: String,
    purpose: String,
    token_hash: Vec<u8>,
    token_salt: Vec<u8>,
    expires_at: DateTime<Utc>,
    consumed_at: Option<DateTime<Utc>>,
    attempt_count: i32,
    created_at: DateTime<Utc>,
    created_ip: Option<String>,
    last_attempt_at: Option<DateTime<Utc>>,
}

impl ActionTokenRow {
    fn into_token(self) -> AppResult<ActionToken> {
        let purpose: TokenPurpose = self
            .purpose
            .parse()
            .map_err(|_| AppError::database(format!("Unknown token purpose: {}", self.purpose)))?;

        Ok(ActionToken {
            id: TokenId::from_uuid(self.id),
            user_id: self.user_id.map(UserId::from_uuid),
            email: self.email,
            purpose,
            token_hash: self.token_hash,
            token_salt: self.token_salt,
            expires_at: self.expires_at,
            consumed_at: self.consumed_at,
            attempt_count: self.attempt_count,
            created_at: self.created_at,
            created_ip: self.created_ip,
            last_attempt_at: self.last_attempt_at,
        })
    }
}
