//! Email adapter
//!
//! Transactional template email over the Brevo HTTP API.

mod client;
mod recording;

pub use client::BrevoClient;
pub use recording::{RecordedEmail, RecordingSender};

use secrecy::Secret;
use serde::Deserialize;

/// Brevo API settings
#[derive(Debug, Clone, Deserialize)]
pub struct BrevoConfig {
    pub api_key: Secret<String>,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    pub sender_name: String,
    pub sender_email: String,
}

fn default_api_url() -> String {
    "https://api.brevo.com/v3/smtp/email".to_string()
}

use finrecon_errors::AppResult;

/// Template email sending interface
#[async_trait::async_trait]
pub trait EmailSender: Send + Sync {
    /// Sends a provider-hosted template email with substitution params
    async fn send_template(
        &self,
        to: &str,
        template_id: i64,
        params: &serde_json::Value,
    ) -> AppResult<()>;
}
