//! In-memory sender for tests and local development

use std::sync::Arc;

use finrecon_errors::{AppError, AppResult};
use tokio::sync::RwLock;
use tracing::info;

use crate::EmailSender;

/// One captured send
#[derive(Debug, Clone)]
pub struct RecordedEmail {
    pub to: String,
    pub template_id: i64,
    pub params: serde_json::Value,
}

/// Email sender that records every send instead of delivering it
pub struct RecordingSender {
    sent: Arc<RwLock<Vec<RecordedEmail>>>,
    fail_sends: bool,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(RwLock::new(Vec::new())),
            fail_sends: false,
        }
    }

    /// Makes every send return an error, leaving nothing recorded
    pub fn failing() -> Self {
        Self {
            sent: Arc::new(RwLock::new(Vec::new())),
            fail_sends: true,
        }
    }

    pub async fn sent(&self) -> Vec<RecordedEmail> {
        self.sent.read().await.clone()
    }

    pub async fn clear(&self) {
        self.sent.write().await.clear();
    }
}

impl Default for RecordingSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl EmailSender for RecordingSender {
    async fn send_template(
        &self,
        to: &str,
        template_id: i64,
        params: &serde_json::Value,
    ) -> AppResult<()> {
        if self.fail_sends {
            return Err(AppError::external_service("Simulated email failure"));
        }

        info!(to = %to, template_id, "Recording template email");
        self.sent.write().await.push(RecordedEmail {
            to: to.to_string(),
            template_id,
            params: params.clone(),
        });
        Ok(())
    }
}
