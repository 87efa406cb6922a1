//! Magic-link email delivery.

use std::sync::Arc;

use finrecon_adapter_email::EmailSender;
use finrecon_errors::{AppError, AppResult};
use serde_json::json;
use tracing::info;

use crate::domain::token::TokenPurpose;

#[derive(Debug, Clone)]
pub struct MailerSettings {
    /// SPA origin the emailed links point at.
    pub frontend_base_url: String,
    pub template_id_verify: i64,
    pub template_id_reset: i64,
    /// Falls back to the reset template when unset.
    pub template_id_change: i64,
    pub expires_minutes: i64,
}

/// Renders the magic link and hands it to the transactional sender.
///
/// A missing base URL or template id means the deployment cannot do
/// what the caller asked, so both are surfaced as configuration errors
/// rather than skipped silently.
pub struct MagicLinkMailer {
    sender: Arc<dyn EmailSender>,
    settings: MailerSettings,
}

impl MagicLinkMailer {
    pub fn new(sender: Arc<dyn EmailSender>, settings: MailerSettings) -> Self {
        Self { sender, settings }
    }

    pub async fn send_link(
        &self,
        to: &str,
        purpose: TokenPurpose,
        secret: &str,
    ) -> AppResult<()> {
        if self.settings.frontend_base_url.trim().is_empty() {
            return Err(AppError::configuration(
                "Frontend base URL is not configured",
            ));
        }

        let template_id = self.template_for(purpose);
        if template_id <= 0 {
            return Err(AppError::configuration(format!(
                "No email template configured for {purpose}"
            )));
        }

        let base = self.settings.frontend_base_url.trim_end_matches('/');
        let link = format!("{base}/auth/magic-link?purpose={purpose}&token={secret}");
        let params = json!({
            "magicLink": link,
            "expiresInMinutes": self.settings.expires_minutes,
        });

        self.sender.send_template(to, template_id, &params).await?;
        info!(%purpose, template_id, "Magic-link email dispatched");
        Ok(())
    }

    fn template_for(&self, purpose: TokenPurpose) -> i64 {
        match purpose {
            TokenPurpose::EmailVerify => self.settings.template_id_verify,
            TokenPurpose::PasswordReset => self.settings.template_id_reset,
            TokenPurpose::ChangePassword => {
                if self.settings.template_id_change > 0 {
                    self.settings.template_id_change
                } else {
                    self.settings.template_id_reset
                }
            }
        }
    }
}
