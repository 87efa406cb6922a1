//! User entity

use chrono::{DateTime, Utc};
use finrecon_common::UserId;
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{Email, HashedPassword};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub password_hash: HashedPassword,
    pub first_name: String,
    pub last_name: String,
    pub display_name: Option<String>,
    pub is_active: bool,
    pub email_confirmed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(
        email: Email,
        first_name: String,
        last_name: String,
        password_hash: HashedPassword,
    ) -> Self {
        let display_name = format!("{} {}", first_name, last_name)
            .trim()
            .to_string();
        Self {
            id: UserId::new(),
            email: email.into_inner(),
            password_hash,
            first_name,
            last_name,
            display_name: Some(display_name),
            is_active: true,
            email_confirmed: false,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Display name, falling back to "First Last" when none was set.
    pub fn display_or_full_name(&self) -> String {
        self.display_name
            .clone()
            .unwrap_or_else(|| self.full_name())
    }

    pub fn confirm_email(&mut self) {
        self.email_confirmed = true;
        self.updated_at = Some(Utc::now());
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.updated_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User::new(
            Email::new("Jane.Doe@Example.COM").unwrap(),
            "Jane".to_string(),
            "Doe".to_string(),
            HashedPassword::from_plain("correct horse battery").unwrap(),
        )
    }

    #[test]
    fn test_new_user_defaults() {
        let user = sample_user();
        assert_eq!(user.email, "jane.doe@example.com");
        assert!(user.is_active);
        assert!(!user.email_confirmed);
        assert_eq!(user.display_name.as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn test_display_name_falls_back_to_full_name() {
        let mut user = sample_user();
        user.display_name = None;
        assert_eq!(user.display_or_full_name(), "Jane Doe");
    }

    #[test]
    fn test_confirm_email_touches_updated_at() {
        let mut user = sample_user();
        user.confirm_email();
        assert!(user.email_confirmed);
        assert!(user.updated_at.is_some());
    }
}
