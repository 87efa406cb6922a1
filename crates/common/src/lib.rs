//! finrecon-common - shared types and utilities

pub mod retry;
pub mod types;

pub use retry::*;
pub use types::*;
