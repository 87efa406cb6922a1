//! Domain layer: aggregates, value objects and repository contracts.

pub mod audit;
pub mod rbac;
pub mod token;
pub mod user;
pub mod value_objects;
