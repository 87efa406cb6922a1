//! Magic-link token engine.
//!
//! Issues single-use secrets and redeems them under a strict check
//! order. Secrets are 32 random bytes, base64url without padding, and
//! only their keyed HMAC-SHA256 digest is persisted. A database
//! compromise therefore yields nothing redeemable without the signing
//! key.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use finrecon_common::UserId;
use finrecon_errors::{AppError, AppResult};
use hmac::{Hmac, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

use crate::domain::token::{ActionToken, ActionTokenRepository, TokenPurpose};

type HmacSha256 = Hmac<Sha256>;

const SECRET_LENGTH: usize = 32;
const SALT_LENGTH: usize = 16;
const DEFAULT_EXPIRES_MINUTES: i64 = 10;
const DEFAULT_MAX_ATTEMPTS: i32 = 5;

#[derive(Clone)]
pub struct MagicLinkSettings {
    /// HMAC key for token digests. Shared with JWT signing.
    pub signing_key: Secret<String>,
    pub expires_minutes: i64,
    pub max_attempts: i32,
    /// Zero disables the resend cooldown.
    pub resend_cooldown_seconds: i64,
}

impl MagicLinkSettings {
    /// Non-positive values fall back to the default time to live.
    pub fn effective_expires_minutes(&self) -> i64 {
        if self.expires_minutes <= 0 {
            DEFAULT_EXPIRES_MINUTES
        } else {
            self.expires_minutes
        }
    }

    pub fn effective_max_attempts(&self) -> i32 {
        if self.max_attempts <= 0 {
            DEFAULT_MAX_ATTEMPTS
        } else {
            self.max_attempts
        }
    }
}

/// A freshly issued secret. The only place the plaintext secret exists.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub secret: String,
    pub expires_at: DateTime<Utc>,
}

/// Result of a consume call. On failure the identity fields still carry
/// whatever the matched row knew, so callers can audit who was targeted;
/// both are `None` when no row matched at all.
#[derive(Debug, Clone)]
pub struct ConsumeOutcome {
    pub success: bool,
    pub user_id: Option<UserId>,
    pub email: Option<String>,
}

impl ConsumeOutcome {
    fn miss() -> Self {
        Self {
            success: false,
            user_id: None,
            email: None,
        }
    }
}

/// Trim and lowercase, applied before any storage or lookup.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub struct MagicLinkService {
    tokens: Arc<dyn ActionTokenRepository>,
    settings: MagicLinkSettings,
}

impl MagicLinkService {
    pub fn new(tokens: Arc<dyn ActionTokenRepository>, settings: MagicLinkSettings) -> Self {
        Self { tokens, settings }
    }

    /// Issue a fresh token for `email`, or `None` when an unconsumed
    /// token for the same address and purpose is still inside the
    /// resend cooldown window.
    pub async fn issue(
        &self,
        email: &str,
        user_id: Option<UserId>,
        purpose: TokenPurpose,
        created_ip: Option<String>,
    ) -> AppResult<Option<IssuedToken>> {
        let normalized = normalize_email(email);
        let now = Utc::now();

        if self.settings.resend_cooldown_seconds > 0 {
            let since = now - Duration::seconds(self.settings.resend_cooldown_seconds);
            if self
                .tokens
                .has_recent_unconsumed(&normalized, purpose, since)
                .await?
            {
                debug!(%purpose, "Token issuance suppressed by resend cooldown");
                return Ok(None);
            }
        }

        let mut secret_bytes = [0u8; SECRET_LENGTH];
        OsRng.fill_bytes(&mut secret_bytes);
        let secret = URL_SAFE_NO_PAD.encode(secret_bytes);

        let mut salt = vec![0u8; SALT_LENGTH];
        OsRng.fill_bytes(&mut salt);

        let token_hash = self.compute_hash(&secret)?;
        let ttl = Duration::minutes(self.settings.effective_expires_minutes());

        let token = ActionToken::new(
            normalized,
            user_id,
            purpose,
            token_hash,
            salt,
            ttl,
            created_ip,
        );
        let expires_at = token.expires_at;
        self.tokens.insert(&token).await?;

        info!(token_id = %token.id, %purpose, "Issued action token");
        Ok(Some(IssuedToken { secret, expires_at }))
    }

    /// Redeem a secret. Check order: lookup by purpose and digest,
    /// constant-time digest recheck, consumable state, then the
    /// expected-user binding. Every failure past the lookup registers
    /// an attempt on the matched row; a lookup miss mutates nothing.
    pub async fn consume(
        &self,
        raw_secret: &str,
        purpose: TokenPurpose,
        expected_user_id: Option<&UserId>,
    ) -> AppResult<ConsumeOutcome> {
        let token_hash = self.compute_hash(raw_secret)?;

        let Some(token) = self
            .tokens
            .find_by_purpose_and_hash(purpose, &token_hash)
            .await?
        else {
            debug!(%purpose, "No token row matched the presented secret");
            return Ok(ConsumeOutcome::miss());
        };

        let now = Utc::now();

        if !bool::from(token.token_hash.ct_eq(&token_hash)) {
            return self.reject(&token, now, "hash_mismatch").await;
        }

        if !token.is_consumable(now, self.settings.effective_max_attempts()) {
            return self.reject(&token, now, "expired_spent_or_locked").await;
        }

        if let Some(expected) = expected_user_id {
            if token.user_id.as_ref() != Some(expected) {
                return self.reject(&token, now, "user_mismatch").await;
            }
        }

        if !self.tokens.mark_consumed(&token.id, now).await? {
            // A concurrent request won the consume race.
            return self.reject(&token, now, "consume_race").await;
        }

        info!(token_id = %token.id, %purpose, "Consumed action token");
        Ok(ConsumeOutcome {
            success: true,
            user_id: token.user_id,
            email: Some(token.email),
        })
    }

    async fn reject(
        &self,
        token: &ActionToken,
        now: DateTime<Utc>,
        reason: &'static str,
    ) -> AppResult<ConsumeOutcome> {
        warn!(token_id = %token.id, purpose = %token.purpose, reason, "Action token rejected");
        self.tokens.register_attempt(&token.id, now).await?;
        Ok(ConsumeOutcome {
            success: false,
            user_id: token.user_id.clone(),
            email: Some(token.email.clone()),
        })
    }

    /// Keyed digest of the secret. An unconfigured signing key is a
    /// deployment fault and fails the request before any row is read.
    fn compute_hash(&self, raw_secret: &str) -> AppResult<Vec<u8>> {
        let key = self.settings.signing_key.expose_secret();
        if key.trim().is_empty() {
            return Err(AppError::configuration(
                "Token signing key is not configured",
            ));
        }

        let mut mac = HmacSha256::new_from_slice(key.as_bytes())
            .map_err(|_| AppError::configuration("Token signing key is unusable"))?;
        mac.update(raw_secret.as_bytes());
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::InMemoryTokenRepository;

    fn settings(expires_minutes: i64, max_attempts: i32, cooldown: i64) -> MagicLinkSettings {
        MagicLinkSettings {
            signing_key: Secret::new("unit-test-signing-key-0123456789".to_string()),
            expires_minutes,
            max_attempts,
            resend_cooldown_seconds: cooldown,
        }
    }

    fn service(repo: Arc<InMemoryTokenRepository>) -> MagicLinkService {
        MagicLinkService::new(repo, settings(10, 5, 0))
    }

    #[test]
    fn test_hash_is_deterministic_and_not_the_secret() {
        let svc = service(Arc::new(InMemoryTokenRepository::new()));
        let a = svc.compute_hash("some-secret").unwrap();
        let b = svc.compute_hash("some-secret").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert_ne!(a, b"some-secret".to_vec());
        assert_ne!(a, svc.compute_hash("other-secret").unwrap());
    }

    #[tokio::test]
    async fn test_issue_persists_digest_not_secret() {
        let repo = Arc::new(InMemoryTokenRepository::new());
        let svc = service(repo.clone());
        let user_id = UserId::new();

        let issued = svc
            .issue(
                "  User@Example.COM ",
                Some(user_id.clone()),
                TokenPurpose::EmailVerify,
                Some("10.0.0.1".to_string()),
            )
            .await
            .unwrap()
            .unwrap();

        let rows = repo.all();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.email, "user@example.com");
        assert_eq!(row.user_id, Some(user_id));
        assert_eq!(row.purpose, TokenPurpose::EmailVerify);
        assert_eq!(row.attempt_count, 0);
        assert!(row.consumed_at.is_none());
        assert_eq!(row.token_salt.len(), 16);
        assert_eq!(row.token_hash.len(), 32);
        assert_ne!(row.token_hash, issued.secret.as_bytes().to_vec());
        assert_eq!(row.created_ip.as_deref(), Some("10.0.0.1"));

        let remaining = issued.expires_at - Utc::now();
        assert!(remaining > Duration::minutes(9) && remaining <= Duration::minutes(10));
    }

    #[tokio::test]
    async fn test_non_positive_ttl_falls_back_to_default() {
        let repo = Arc::new(InMemoryTokenRepository::new());
        let svc = MagicLinkService::new(repo, settings(0, 5, 0));

        let issued = svc
            .issue("user@example.com", None, TokenPurpose::PasswordReset, None)
            .await
            .unwrap()
            .unwrap();

        let remaining = issued.expires_at - Utc::now();
        assert!(remaining > Duration::minutes(9) && remaining <= Duration::minutes(10));
    }

    #[tokio::test]
    async fn test_token_is_single_use() {
        let repo = Arc::new(InMemoryTokenRepository::new());
        let svc = service(repo.clone());
        let user_id = UserId::new();

        let issued = svc
            .issue(
                "user@example.com",
                Some(user_id.clone()),
                TokenPurpose::EmailVerify,
                None,
            )
            .await
            .unwrap()
            .unwrap();

        let first = svc
            .consume(&issued.secret, TokenPurpose::EmailVerify, None)
            .await
            .unwrap();
        assert!(first.success);
        assert_eq!(first.user_id, Some(user_id));
        assert_eq!(first.email.as_deref(), Some("user@example.com"));

        let second = svc
            .consume(&issued.secret, TokenPurpose::EmailVerify, None)
            .await
            .unwrap();
        assert!(!second.success);
        // The replay still identifies the row and leaves a trace.
        assert!(second.email.is_some());
        assert_eq!(repo.all()[0].attempt_count, 1);
        assert!(repo.all()[0].consumed_at.is_some());
    }

    #[tokio::test]
    async fn test_unknown_secret_is_a_silent_miss() {
        let repo = Arc::new(InMemoryTokenRepository::new());
        let svc = service(repo.clone());

        svc.issue("user@example.com", None, TokenPurpose::EmailVerify, None)
            .await
            .unwrap();

        let outcome = svc
            .consume("completely-wrong", TokenPurpose::EmailVerify, None)
            .await
            .unwrap();
        assert!(!outcome.success);
        assert!(outcome.user_id.is_none());
        assert!(outcome.email.is_none());
        assert_eq!(repo.all()[0].attempt_count, 0);
    }

    #[tokio::test]
    async fn test_expired_token_fails_and_registers_attempt() {
        let repo = Arc::new(InMemoryTokenRepository::new());
        let svc = service(repo.clone());

        let issued = svc
            .issue("user@example.com", None, TokenPurpose::PasswordReset, None)
            .await
            .unwrap()
            .unwrap();
        let id = repo.all()[0].id.clone();
        repo.update(&id, |t| t.expires_at = Utc::now() - Duration::seconds(1));

        let outcome = svc
            .consume(&issued.secret, TokenPurpose::PasswordReset, None)
            .await
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.email.as_deref(), Some("user@example.com"));
        assert_eq!(repo.all()[0].attempt_count, 1);
        assert!(repo.all()[0].last_attempt_at.is_some());
    }

    #[tokio::test]
    async fn test_attempt_limit_locks_token() {
        let repo = Arc::new(InMemoryTokenRepository::new());
        let svc = MagicLinkService::new(repo.clone(), settings(10, 2, 0));

        let issued = svc
            .issue("user@example.com", None, TokenPurpose::EmailVerify, None)
            .await
            .unwrap()
            .unwrap();
        let id = repo.all()[0].id.clone();
        repo.update(&id, |t| t.attempt_count = 2);

        let outcome = svc
            .consume(&issued.secret, TokenPurpose::EmailVerify, None)
            .await
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(repo.all()[0].attempt_count, 3);
    }

    #[tokio::test]
    async fn test_purpose_is_part_of_the_lookup_key() {
        let repo = Arc::new(InMemoryTokenRepository::new());
        let svc = service(repo.clone());

        let issued = svc
            .issue("user@example.com", None, TokenPurpose::EmailVerify, None)
            .await
            .unwrap()
            .unwrap();

        let outcome = svc
            .consume(&issued.secret, TokenPurpose::PasswordReset, None)
            .await
            .unwrap();
        assert!(!outcome.success);
        assert!(outcome.email.is_none());
        // Cross-purpose redemption is a miss, not a failed attempt.
        assert_eq!(repo.all()[0].attempt_count, 0);
    }

    #[tokio::test]
    async fn test_expected_user_binding() {
        let repo = Arc::new(InMemoryTokenRepository::new());
        let svc = service(repo.clone());
        let owner = UserId::new();
        let intruder = UserId::new();

        let issued = svc
            .issue(
                "user@example.com",
                Some(owner.clone()),
                TokenPurpose::ChangePassword,
                None,
            )
            .await
            .unwrap()
            .unwrap();

        let mismatch = svc
            .consume(&issued.secret, TokenPurpose::ChangePassword, Some(&intruder))
            .await
            .unwrap();
        assert!(!mismatch.success);
        assert_eq!(mismatch.user_id, Some(owner.clone()));
        assert_eq!(repo.all()[0].attempt_count, 1);

        let matched = svc
            .consume(&issued.secret, TokenPurpose::ChangePassword, Some(&owner))
            .await
            .unwrap();
        assert!(matched.success);
    }

    #[tokio::test]
    async fn test_anonymous_token_fails_expected_user_check() {
        let repo = Arc::new(InMemoryTokenRepository::new());
        let svc = service(repo.clone());
        let expected = UserId::new();

        let issued = svc
            .issue("user@example.com", None, TokenPurpose::ChangePassword, None)
            .await
            .unwrap()
            .unwrap();

        let outcome = svc
            .consume(&issued.secret, TokenPurpose::ChangePassword, Some(&expected))
            .await
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(repo.all()[0].attempt_count, 1);
    }

    #[tokio::test]
    async fn test_cooldown_suppresses_reissue() {
        let repo = Arc::new(InMemoryTokenRepository::new());
        let svc = MagicLinkService::new(repo.clone(), settings(10, 5, 60));

        let first = svc
            .issue("user@example.com", None, TokenPurpose::PasswordReset, None)
            .await
            .unwrap();
        assert!(first.is_some());

        let second = svc
            .issue("user@example.com", None, TokenPurpose::PasswordReset, None)
            .await
            .unwrap();
        assert!(second.is_none());
        assert_eq!(repo.all().len(), 1);

        // A different purpose is outside the window.
        let other_purpose = svc
            .issue("user@example.com", None, TokenPurpose::EmailVerify, None)
            .await
            .unwrap();
        assert!(other_purpose.is_some());

        // Consuming the pending token lifts the cooldown.
        let id = repo.all()[0].id.clone();
        repo.update(&id, |t| t.consumed_at = Some(Utc::now()));
        let after_consume = svc
            .issue("user@example.com", None, TokenPurpose::PasswordReset, None)
            .await
            .unwrap();
        assert!(after_consume.is_some());
    }

    #[tokio::test]
    async fn test_zero_cooldown_always_issues() {
        let repo = Arc::new(InMemoryTokenRepository::new());
        let svc = service(repo.clone());

        for _ in 0..3 {
            let issued = svc
                .issue("user@example.com", None, TokenPurpose::PasswordReset, None)
                .await
                .unwrap();
            assert!(issued.is_some());
        }
        assert_eq!(repo.all().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_signing_key_is_a_configuration_error() {
        let repo = Arc::new(InMemoryTokenRepository::new());
        let svc = MagicLinkService::new(
            repo,
            MagicLinkSettings {
                signing_key: Secret::new("   ".to_string()),
                expires_minutes: 10,
                max_attempts: 5,
                resend_cooldown_seconds: 0,
            },
        );

        let issue_err = svc
            .issue("user@example.com", None, TokenPurpose::EmailVerify, None)
            .await
            .unwrap_err();
        assert!(matches!(issue_err, AppError::Configuration(_)));

        let consume_err = svc
            .consume("anything", TokenPurpose::EmailVerify, None)
            .await
            .unwrap_err();
        assert!(matches!(consume_err, AppError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_mark_consumed_is_first_writer_wins() {
        let repo = Arc::new(InMemoryTokenRepository::new());
        let svc = service(repo.clone());

        svc.issue("user@example.com", None, TokenPurpose::EmailVerify, None)
            .await
            .unwrap();
        let id = repo.all()[0].id.clone();

        assert!(repo.mark_consumed(&id, Utc::now()).await.unwrap());
        assert!(!repo.mark_consumed(&id, Utc::now()).await.unwrap());
    }
}
