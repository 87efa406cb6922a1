//! Request-scoped permission resolution.

pub mod resolver;

pub use resolver::PermissionResolver;
