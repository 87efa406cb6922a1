//! Audit entry

use finrecon_common::UserId;
use serde::{Deserialize, Serialize};

/// Well-known audit actions.
pub mod events {
    pub const USER_REGISTERED: &str = "UserRegistered";
    pub const USER_LOGGED_IN: &str = "UserLoggedIn";
    pub const MAGIC_LINK_REQUESTED: &str = "MagicLinkRequested";
    pub const MAGIC_LINK_CONSUMED: &str = "MagicLinkConsumed";
    pub const MAGIC_LINK_CONSUME_FAILED: &str = "MagicLinkConsumedFailed";
    pub const EMAIL_VERIFIED: &str = "EmailVerified";
    pub const PASSWORD_RESET_COMPLETED: &str = "PasswordResetCompleted";
    pub const PASSWORD_CHANGED: &str = "PasswordChanged";
}

/// One security-relevant event. `created_at` is assigned at write time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub user_id: Option<UserId>,
    pub action: String,
    pub entity: Option<String>,
    pub entity_id: Option<String>,
    pub metadata: Option<String>,
    pub ip_address: Option<String>,
}

impl AuditEntry {
    pub fn new(action: &str) -> Self {
        Self {
            user_id: None,
            action: action.to_string(),
            entity: None,
            entity_id: None,
            metadata: None,
            ip_address: None,
        }
    }

    pub fn with_user(mut self, user_id: &UserId) -> Self {
        self.user_id = Some(user_id.clone());
        self
    }

    pub fn with_user_opt(mut self, user_id: Option<UserId>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_entity(mut self, entity: &str, entity_id: Option<String>) -> Self {
        self.entity = Some(entity.to_string());
        self.entity_id = entity_id;
        self
    }

    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }

    pub fn with_ip(mut self, ip_address: Option<String>) -> Self {
        self.ip_address = ip_address;
        self
    }
}
