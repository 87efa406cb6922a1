//! Action token entity

use chrono::{DateTime, Duration, Utc};
use finrecon_common::{TokenId, UserId};
use serde::{Deserialize, Serialize};

/// What a token authorizes once consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenPurpose {
    EmailVerify,
    PasswordReset,
    ChangePassword,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::EmailVerify => "EmailVerify",
            TokenPurpose::PasswordReset => "PasswordReset",
            TokenPurpose::ChangePassword => "ChangePassword",
        }
    }
}

impl std::fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown token purpose: {0}")]
pub struct UnknownPurpose(pub String);

impl std::str::FromStr for TokenPurpose {
    type Err = UnknownPurpose;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EmailVerify" => Ok(TokenPurpose::EmailVerify),
            "PasswordReset" => Ok(TokenPurpose::PasswordReset),
            "ChangePassword" => Ok(TokenPurpose::ChangePassword),
            other => Err(UnknownPurpose(other.to_string())),
        }
    }
}

/// A single-use credential delivered out of band.
///
/// Only the HMAC of the secret is stored; the secret itself leaves the
/// system exactly once, embedded in the emailed link. `user_id` is
/// optional so a token can be issued for an address before any account
/// exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionToken {
    pub id: TokenId,
    pub user_id: Option<UserId>,
    pub email: String,
    pub purpose: TokenPurpose,
    pub token_hash: Vec<u8>,
    pub token_salt: Vec<u8>,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub attempt_count: i32,
    pub created_at: DateTime<Utc>,
    pub created_ip: Option<String>,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl ActionToken {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        email: String,
        user_id: Option<UserId>,
        purpose: TokenPurpose,
        token_hash: Vec<u8>,
        token_salt: Vec<u8>,
        ttl: Duration,
        created_ip: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TokenId::new(),
            user_id,
            email,
            purpose,
            token_hash,
            token_salt,
            expires_at: now + ttl,
            consumed_at: None,
            attempt_count: 0,
            created_at: now,
            created_ip,
            last_attempt_at: None,
        }
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed_at.is_some()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn attempts_exhausted(&self, max_attempts: i32) -> bool {
        self.attempt_count >= max_attempts
    }

    pub fn is_consumable(&self, now: DateTime<Utc>, max_attempts: i32) -> bool {
        !self.is_consumed() && !self.is_expired(now) && !self.attempts_exhausted(max_attempts)
    }
}
