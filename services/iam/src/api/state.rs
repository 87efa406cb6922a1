//! Shared handler state.

use std::sync::Arc;

use finrecon_auth_core::TokenService;
use sqlx::PgPool;
use tracing::warn;

use crate::application::magic_link::{MagicLinkMailer, MagicLinkService};
use crate::domain::audit::{AuditEntry, AuditLogRepository};
use crate::domain::rbac::RbacRepository;
use crate::domain::user::UserRepository;

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub rbac: Arc<dyn RbacRepository>,
    pub audit: Arc<dyn AuditLogRepository>,
    pub magic_links: Arc<MagicLinkService>,
    pub mailer: Arc<MagicLinkMailer>,
    pub token_service: TokenService,
    pub pool: PgPool,
}

impl AppState {
    /// Record an audit entry. Persistence failures are logged and
    /// swallowed; auditing never turns a successful request into an
    /// error.
    pub async fn record_audit(&self, entry: AuditEntry) {
        if let Err(err) = self.audit.record(&entry).await {
            warn!(error = %err, action = %entry.action, "Failed to write audit entry");
        }
    }
}
