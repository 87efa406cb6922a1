//! PostgreSQL audit log repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use finrecon_errors::AppResult;
use sqlx::PgPool;
use uuid::Uuid;

use super::error_mapper::map_sqlx_error;
use crate::domain::audit::{AuditEntry, AuditLogRepository};

pub struct PostgresAuditLogRepository {
    pool: PgPool,
}

impl PostgresAuditLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLogRepository for PostgresAuditLogRepository {
    async fn record(&self, entry: &AuditEntry) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs
                (id, user_id, action, entity, entity_id, metadata, ip_address, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(entry.user_id.as_ref().map(|u| u.0))
        .bind(&entry.action)
        .bind(&entry.entity)
        .bind(&entry.entity_id)
        .bind(&entry.metadata)
        .bind(&entry.ip_address)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}
