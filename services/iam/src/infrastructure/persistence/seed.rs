//! Startup seeding for the RBAC catalog.
//!
//! Inserts the built-in roles and the permission catalog, grants the full
//! catalog to ADMIN and basic access to USER, and promotes any accounts
//! listed in the operator-supplied admin email list. Every statement is an
//! upsert so repeated startups converge on the same state.

use chrono::Utc;
use finrecon_errors::AppResult;
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use super::error_mapper::map_sqlx_error;

struct PermissionSeed {
    code: &'static str,
    name: &'static str,
    module: &'static str,
    description: &'static str,
}

const PERMISSION_CATALOG: &[PermissionSeed] = &[
    PermissionSeed {
        code: "ADMIN.USERS.MANAGE",
        name: "Manage users",
        module: "Admin",
        description: "Create, edit and deactivate user accounts",
    },
    PermissionSeed {
        code: "ADMIN.ROLES.MANAGE",
        name: "Manage roles",
        module: "Admin",
        description: "Create and edit roles and their grants",
    },
    PermissionSeed {
        code: "ADMIN.PERMISSIONS.MANAGE",
        name: "Manage permissions",
        module: "Admin",
        description: "Edit the permission catalog",
    },
    PermissionSeed {
        code: "ADMIN.DASHBOARD.VIEW",
        name: "View admin dashboard",
        module: "Admin",
        description: "Access the administration dashboard",
    },
    PermissionSeed {
        code: "ADMIN.COMPONENTS.MANAGE",
        name: "Manage components",
        module: "Admin",
        description: "Configure reconciliation components",
    },
    PermissionSeed {
        code: "USER_MANAGEMENT",
        name: "User management",
        module: "Admin",
        description: "Legacy alias for user administration",
    },
    PermissionSeed {
        code: "ROLE_MANAGEMENT",
        name: "Role management",
        module: "Admin",
        description: "Legacy alias for role administration",
    },
    PermissionSeed {
        code: "PERMISSION_MANAGEMENT",
        name: "Permission management",
        module: "Admin",
        description: "Legacy alias for permission administration",
    },
    PermissionSeed {
        code: "ADMIN_DASHBOARD",
        name: "Admin dashboard",
        module: "Admin",
        description: "Legacy alias for the administration dashboard",
    },
    PermissionSeed {
        code: "MATCHER.VIEW",
        name: "View matcher",
        module: "Matcher",
        description: "View reconciliation match runs",
    },
    PermissionSeed {
        code: "MATCHER.MANAGE",
        name: "Manage matcher",
        module: "Matcher",
        description: "Configure and trigger match runs",
    },
    PermissionSeed {
        code: "BALANCER.VIEW",
        name: "View balancer",
        module: "Balancer",
        description: "View balance comparisons",
    },
    PermissionSeed {
        code: "BALANCER.MANAGE",
        name: "Manage balancer",
        module: "Balancer",
        description: "Configure balance comparisons",
    },
    PermissionSeed {
        code: "TASKS.VIEW",
        name: "View tasks",
        module: "Tasks",
        description: "View background task runs",
    },
    PermissionSeed {
        code: "JOURNAL.VIEW",
        name: "View journal",
        module: "Journal",
        description: "View the operation journal",
    },
    PermissionSeed {
        code: "ANALYTICS.VIEW",
        name: "View analytics",
        module: "Analytics",
        description: "View analytics reports",
    },
    PermissionSeed {
        code: "BASIC_ACCESS",
        name: "Basic access",
        module: "Core",
        description: "Sign in and use the application shell",
    },
];

/// Seeds roles, permissions and grants. Idempotent.
pub async fn seed_catalog(pool: &PgPool, admin_emails: &str) -> AppResult<()> {
    let admin_role_id = ensure_role(
        pool,
        "ADMIN",
        "Administrator",
        "Full access to every module",
        true,
    )
    .await?;
    let user_role_id = ensure_role(
        pool,
        "USER",
        "User",
        "Standard account with basic access",
        true,
    )
    .await?;

    for seed in PERMISSION_CATALOG {
        let permission_id = ensure_permission(pool, seed).await?;
        grant_permission(pool, admin_role_id, permission_id).await?;
        if seed.code == "BASIC_ACCESS" {
            grant_permission(pool, user_role_id, permission_id).await?;
        }
    }

    assign_admin_role(pool, admin_role_id, admin_emails).await?;

    info!(
        permissions = PERMISSION_CATALOG.len(),
        "RBAC catalog seeded"
    );
    Ok(())
}

async fn ensure_role(
    pool: &PgPool,
    code: &str,
    name: &str,
    description: &str,
    is_system: bool,
) -> AppResult<Uuid> {
    // DO UPDATE keeps RETURNING usable when the row already exists
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO roles (id, code, name, description, is_system, is_active, created_at)
        VALUES ($1, $2, $3, $4, $5, TRUE, $6)
        ON CONFLICT (code) DO UPDATE
        SET name = EXCLUDED.name, description = EXCLUDED.description
        RETURNING id
        "#,
    )
    .bind(Uuid::now_v7())
    .bind(code)
    .bind(name)
    .bind(description)
    .bind(is_system)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .map_err(map_sqlx_error)?;

    Ok(id)
}

async fn ensure_permission(pool: &PgPool, seed: &PermissionSeed) -> AppResult<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO permissions (id, code, name, module, description, is_active, created_at)
        VALUES ($1, $2, $3, $4, $5, TRUE, $6)
        ON CONFLICT (code) DO UPDATE
        SET name = EXCLUDED.name, module = EXCLUDED.module, description = EXCLUDED.description
        RETURNING id
        "#,
    )
    .bind(Uuid::now_v7())
    .bind(seed.code)
    .bind(seed.name)
    .bind(seed.module)
    .bind(seed.description)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .map_err(map_sqlx_error)?;

    Ok(id)
}

async fn grant_permission(pool: &PgPool, role_id: Uuid, permission_id: Uuid) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO role_permissions (role_id, permission_id, granted_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (role_id, permission_id) DO NOTHING
        "#,
    )
    .bind(role_id)
    .bind(permission_id)
    .bind(Utc::now())
    .execute(pool)
    .await
    .map_err(map_sqlx_error)?;

    Ok(())
}

/// Grants ADMIN to every account named in the operator list. Addresses
/// without an account are skipped; they pick the role up on a later startup.
async fn assign_admin_role(pool: &PgPool, role_id: Uuid, raw_emails: &str) -> AppResult<()> {
    for email in parse_admin_emails(raw_emails) {
        let user: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
            .bind(&email)
            .fetch_optional(pool)
            .await
            .map_err(map_sqlx_error)?;

        match user {
            Some((user_id,)) => {
                sqlx::query(
                    r#"
                    INSERT INTO user_roles (user_id, role_id, assigned_at)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (user_id, role_id) DO NOTHING
                    "#,
                )
                .bind(user_id)
                .bind(role_id)
                .bind(Utc::now())
                .execute(pool)
                .await
                .map_err(map_sqlx_error)?;

                info!(%email, "Granted ADMIN role");
            }
            None => {
                debug!(%email, "Admin email has no account yet");
            }
        }
    }

    Ok(())
}

/// Splits an operator-supplied list on `;`, `,` or whitespace and
/// normalizes each entry the way stored emails are normalized.
fn parse_admin_emails(raw: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    raw.split([';', ',', ' '])
        .map(|part| part.trim().to_lowercase())
        .filter(|part| !part.is_empty())
        .filter(|part| seen.insert(part.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_admin_emails_mixed_separators() {
        let emails = parse_admin_emails("ops@corp.test;Admin@Corp.test, second@corp.test");
        assert_eq!(
            emails,
            vec!["ops@corp.test", "admin@corp.test", "second@corp.test"]
        );
    }

    #[test]
    fn test_parse_admin_emails_dedupes_after_normalization() {
        let emails = parse_admin_emails("OPS@corp.test ops@corp.test");
        assert_eq!(emails, vec!["ops@corp.test"]);
    }

    #[test]
    fn test_parse_admin_emails_empty_input() {
        assert!(parse_admin_emails("").is_empty());
        assert!(parse_admin_emails(" ; , ").is_empty());
    }

    #[test]
    fn test_catalog_contains_basic_access() {
        assert!(PERMISSION_CATALOG.iter().any(|p| p.code == "BASIC_ACCESS"));
    }

    #[test]
    fn test_catalog_codes_are_unique() {
        let mut codes: Vec<_> = PERMISSION_CATALOG.iter().map(|p| p.code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), PERMISSION_CATALOG.len());
    }
}
