//! Magic-link issuance, consumption and delivery.

pub mod mailer;
pub mod service;

pub use mailer::{MagicLinkMailer, MailerSettings};
pub use service::{ConsumeOutcome, IssuedToken, MagicLinkService, MagicLinkSettings, normalize_email};
