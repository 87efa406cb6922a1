//! Audit log repository contract

use async_trait::async_trait;
use finrecon_errors::AppResult;

use super::entry::AuditEntry;

#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    async fn record(&self, entry: &AuditEntry) -> AppResult<()>;
}
