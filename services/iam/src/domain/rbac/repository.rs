//! RBAC read contract

use async_trait::async_trait;
use finrecon_common::UserId;
use finrecon_errors::AppResult;

#[async_trait]
pub trait RbacRepository: Send + Sync {
    /// Distinct permission codes granted through the user's active roles.
    /// Grants attached to deactivated roles are excluded.
    async fn permission_codes_for_user(&self, user_id: &UserId) -> AppResult<Vec<String>>;

    /// Distinct codes of the user's active roles.
    async fn role_codes_for_user(&self, user_id: &UserId) -> AppResult<Vec<String>>;
}
