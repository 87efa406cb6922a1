//! Infrastructure layer.

pub mod persistence;

pub use persistence::{
    PostgresActionTokenRepository, PostgresAuditLogRepository, PostgresRbacRepository,
    PostgresUserRepository,
};
