//! User repository contract

use async_trait::async_trait;
use finrecon_common::UserId;
use finrecon_errors::AppResult;

use super::user::User;
use crate::domain::value_objects::HashedPassword;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn insert(&self, user: &User) -> AppResult<()>;

    async fn find_by_id(&self, id: &UserId) -> AppResult<Option<User>>;

    /// Exact match; callers normalize the address first.
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn email_exists(&self, email: &str) -> AppResult<bool>;

    async fn mark_email_confirmed(&self, id: &UserId) -> AppResult<()>;

    async fn update_password(&self, id: &UserId, password_hash: &HashedPassword) -> AppResult<()>;
}
