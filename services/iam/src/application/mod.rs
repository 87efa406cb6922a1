//! Application layer: orchestration over the domain contracts.

pub mod magic_link;
pub mod permissions;
