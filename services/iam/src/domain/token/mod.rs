//! Single-use action tokens backing the magic-link flows.

pub mod action_token;
pub mod repository;

pub use action_token::{ActionToken, TokenPurpose, UnknownPurpose};
pub use repository::ActionTokenRepository;
