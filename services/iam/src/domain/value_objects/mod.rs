//! Value objects

pub mod email;
pub mod password;

pub use email::*;
pub use password::*;
