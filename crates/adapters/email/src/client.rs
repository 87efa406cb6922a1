//! Brevo client implementation

use std::time::Duration;

use finrecon_common::retry::{RetryConfig, with_conditional_retry};
use finrecon_errors::{AppError, AppResult};
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::{BrevoConfig, EmailSender};

#[derive(Debug, Error)]
enum SendAttemptError {
    #[error("Brevo API returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl SendAttemptError {
    /// Rate limiting and server-side failures are worth retrying;
    /// anything else fails the send immediately.
    fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => matches!(
                status.as_u16(),
                429 | 500 | 502 | 503 | 504
            ),
            Self::Transport(_) => false,
        }
    }
}

#[derive(Serialize)]
struct BrevoParty<'a> {
    name: &'a str,
    email: &'a str,
}

#[derive(Serialize)]
struct BrevoRecipient<'a> {
    email: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BrevoPayload<'a> {
    sender: BrevoParty<'a>,
    to: Vec<BrevoRecipient<'a>>,
    template_id: i64,
    params: &'a serde_json::Value,
}

/// Brevo transactional email client
pub struct BrevoClient {
    config: BrevoConfig,
    http: reqwest::Client,
    retry: RetryConfig,
}

impl BrevoClient {
    pub fn new(config: BrevoConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            retry: RetryConfig::new(3, Duration::from_millis(250), Duration::from_secs(5)),
        }
    }

    async fn send_once(&self, to: &str, template_id: i64, params: &serde_json::Value)
        -> Result<(), SendAttemptError>
    {
        let payload = BrevoPayload {
            sender: BrevoParty {
                name: &self.config.sender_name,
                email: &self.config.sender_email,
            },
            to: vec![BrevoRecipient { email: to }],
            template_id,
            params,
        };

        let response = self
            .http
            .post(&self.config.api_url)
            .header("api-key", self.config.api_key.expose_secret())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(SendAttemptError::Status { status, body })
    }
}

#[async_trait::async_trait]
impl EmailSender for BrevoClient {
    async fn send_template(
        &self,
        to: &str,
        template_id: i64,
        params: &serde_json::Value,
    ) -> AppResult<()> {
        if self.config.api_key.expose_secret().is_empty() {
            return Err(AppError::configuration("Brevo API key is not configured"));
        }
        if template_id <= 0 {
            return Err(AppError::configuration(format!(
                "Invalid Brevo template id: {}",
                template_id
            )));
        }

        debug!(to = %to, template_id, "Sending template email");

        with_conditional_retry(
            &self.retry,
            "brevo_send_template",
            || self.send_once(to, template_id, params),
            SendAttemptError::is_retryable,
        )
        .await
        .map_err(|e| AppError::external_service(format!("Email delivery failed: {}", e)))?;

        info!(to = %to, template_id, "Template email sent");
        Ok(())
    }
}
