//! IAM service entry point.
//!
//! Account registration, password and magic-link authentication, and
//! role-based access control for finrecon360.

mod api;
mod application;
mod domain;
mod infrastructure;

#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::sync::Arc;

use secrecy::ExposeSecret;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use finrecon_adapter_email::{BrevoClient, BrevoConfig};
use finrecon_adapter_postgres::{Migration, MigrationManager, PostgresConfig, create_pool};
use finrecon_auth_core::TokenService;
use finrecon_config::AppConfig;
use finrecon_telemetry::{init_tracing, init_tracing_json};

use api::AppState;
use application::magic_link::{
    MagicLinkMailer, MagicLinkService, MagicLinkSettings, MailerSettings,
};
use infrastructure::persistence::{
    PostgresActionTokenRepository, PostgresAuditLogRepository, PostgresRbacRepository,
    PostgresUserRepository, seed,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load("config")?;

    if config.is_production() {
        init_tracing_json(&config.telemetry.log_level);
    } else {
        init_tracing(&config.telemetry.log_level);
    }

    info!(app = %config.app_name, env = %config.app_env, "Starting IAM service");

    let pg_config = PostgresConfig::new(config.database.url.expose_secret())
        .with_max_connections(config.database.max_connections);
    let pool = create_pool(&pg_config).await?;

    let migrations = [Migration::new(
        1,
        "initial_schema",
        include_str!("../schema.sql"),
    )];
    let migration_result = MigrationManager::new(pool.clone())
        .migrate(&migrations)
        .await?;
    if !migration_result.is_success() {
        for failure in &migration_result.errors {
            error!(version = failure.version, error = %failure.error, "Migration failed");
        }
        return Err("database migration failed".into());
    }
    info!(
        applied = migration_result.applied_count(),
        "Migrations up to date"
    );

    let admin_emails = std::env::var("ADMIN_EMAILS").unwrap_or_default();
    seed::seed_catalog(&pool, &admin_emails).await?;

    let users = Arc::new(PostgresUserRepository::new(pool.clone()));
    let rbac = Arc::new(PostgresRbacRepository::new(pool.clone()));
    let audit = Arc::new(PostgresAuditLogRepository::new(pool.clone()));
    let tokens = Arc::new(PostgresActionTokenRepository::new(pool.clone()));

    info!("Repositories initialized");

    let token_service = TokenService::new(
        config.jwt.secret.expose_secret(),
        config.jwt.expires_in,
        config.jwt.issuer.clone(),
        config.jwt.audience.clone(),
    );

    let link_settings = MagicLinkSettings {
        signing_key: config.jwt.secret.clone(),
        expires_minutes: config.magic_link.expires_minutes,
        max_attempts: config.magic_link.max_attempts,
        resend_cooldown_seconds: config.magic_link.resend_cooldown_seconds,
    };
    let expires_minutes = link_settings.effective_expires_minutes();
    let magic_links = Arc::new(MagicLinkService::new(tokens, link_settings));

    let sender = Arc::new(BrevoClient::new(BrevoConfig {
        api_key: config.email.api_key.clone(),
        api_url: config.email.api_url.clone(),
        sender_name: config.email.sender_name.clone(),
        sender_email: config.email.sender_email.clone(),
    }));
    let mailer = Arc::new(MagicLinkMailer::new(
        sender,
        MailerSettings {
            frontend_base_url: config.magic_link.frontend_base_url.clone(),
            template_id_verify: config.email.template_id_verify,
            template_id_reset: config.email.template_id_reset,
            template_id_change: config.email.template_id_change,
            expires_minutes,
        },
    ));

    let state = AppState {
        users,
        rbac,
        audit,
        magic_links,
        mailer,
        token_service,
        pool,
    };

    let app = api::api_routes(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!(%addr, "IAM service listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
