//! User aggregate.

pub mod repository;
pub mod user;

pub use repository::UserRepository;
pub use user::User;
