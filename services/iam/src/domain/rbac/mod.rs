//! Role and permission grants.
//!
//! Roles and permissions are managed through seeding and operator
//! tooling; this service only reads the effective grants, so the
//! contract is query-only.

pub mod repository;

pub use repository::RbacRepository;
