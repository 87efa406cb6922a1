//! PostgreSQL RBAC query repository implementation.

use async_trait::async_trait;
use finrecon_common::UserId;
use finrecon_errors::AppResult;
use sqlx::PgPool;

use super::error_mapper::map_sqlx_error;
use crate::domain::rbac::RbacRepository;

pub struct PostgresRbacRepository {
    pool: PgPool,
}

impl PostgresRbacRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RbacRepository for PostgresRbacRepository {
    async fn permission_codes_for_user(&self, user_id: &UserId) -> AppResult<Vec<String>> {
        let codes = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT p.code
            FROM permissions p
            INNER JOIN role_permissions rp ON p.id = rp.permission_id
            INNER JOIN user_roles ur ON rp.role_id = ur.role_id
            INNER JOIN roles r ON ur.role_id = r.id
            WHERE ur.user_id = $1 AND r.is_active = TRUE AND p.is_active = TRUE
            ORDER BY p.code
            "#,
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(codes)
    }

    async fn role_codes_for_user(&self, user_id: &UserId) -> AppResult<Vec<String>> {
        let codes = sqlx::query_scalar::<_, String>(
            r#"
            SELECT r.code
            FROM roles r
            INNER JOIN user_roles ur ON r.id = ur.role_id
            WHERE ur.user_id = $1 AND r.is_active = TRUE
            ORDER BY r.is_system DESC, r.code
            "#,
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(codes)
    }
}
