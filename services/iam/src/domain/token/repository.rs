//! Action token repository contract

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use finrecon_common::TokenId;
use finrecon_errors::AppResult;

use super::action_token::{ActionToken, TokenPurpose};

#[async_trait]
pub trait ActionTokenRepository: Send + Sync {
    async fn insert(&self, token: &ActionToken) -> AppResult<()>;

    /// Lookup by purpose and HMAC digest. Purpose is part of the key so a
    /// secret issued for one flow can never be redeemed in another.
    async fn find_by_purpose_and_hash(
        &self,
        purpose: TokenPurpose,
        token_hash: &[u8],
    ) -> AppResult<Option<ActionToken>>;

    /// True when an unconsumed token for this address and purpose was
    /// created at or after `since`.
    async fn has_recent_unconsumed(
        &self,
        email: &str,
        purpose: TokenPurpose,
        since: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// Bump the attempt counter. Applies to consumed rows as well, so
    /// replays of a spent token keep leaving a trace.
    async fn register_attempt(&self, id: &TokenId, at: DateTime<Utc>) -> AppResult<()>;

    /// Atomically mark the token consumed. Returns false when another
    /// request already consumed it, in which case nothing was written.
    async fn mark_consumed(&self, id: &TokenId, at: DateTime<Utc>) -> AppResult<bool>;
}
