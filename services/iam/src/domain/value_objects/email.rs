//! Email value object

use serde::{Deserialize, Serialize};
use std::fmt;

/// A validated, normalized email address.
///
/// Normalization is trim plus lowercase. Every address stored or
/// compared anywhere in the service goes through this type first, so
/// lookups never miss on casing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Email(pub String);

impl Email {
    pub fn new(email: impl Into<String>) -> Result<Self, EmailError> {
        let email = email.into();
        let trimmed = email.trim();

        if !email_address::EmailAddress::is_valid(trimmed) {
            return Err(EmailError::InvalidFormat(trimmed.to_string()));
        }
        if trimmed.len() > 256 {
            return Err(EmailError::TooLong);
        }

        Ok(Self(trimmed.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Invalid email format: {0}")]
    InvalidFormat(String),

    #[error("Email must not exceed 256 characters")]
    TooLong,
}

impl From<EmailError> for finrecon_errors::AppError {
    fn from(err: EmailError) -> Self {
        finrecon_errors::AppError::validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_emails() {
        assert!(Email::new("user@example.com").is_ok());
        assert!(Email::new("user.name@example.com").is_ok());
        assert!(Email::new("user+tag@example.co.uk").is_ok());
    }

    #[test]
    fn test_invalid_emails() {
        assert!(Email::new("userexample.com").is_err());
        assert!(Email::new("@example.com").is_err());
        assert!(Email::new("user@").is_err());
        assert!(Email::new("user name@example.com").is_err());
        assert!(Email::new("").is_err());
        assert!(Email::new("   ").is_err());
    }

    #[test]
    fn test_normalizes_case_and_whitespace() {
        let email = Email::new("  User@Example.COM  ").unwrap();
        assert_eq!(email.as_str(), "user@example.com");
    }

    #[test]
    fn test_rejects_overlong_address() {
        let local = "a".repeat(250);
        assert!(Email::new(format!("{local}@example.com")).is_err());
    }
}
