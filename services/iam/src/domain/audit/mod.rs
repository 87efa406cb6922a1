//! Append-only audit trail.

pub mod entry;
pub mod repository;

pub use entry::{AuditEntry, events};
pub use repository::AuditLogRepository;
