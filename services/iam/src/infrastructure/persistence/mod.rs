//! PostgreSQL persistence implementations.

pub mod audit_log_repository;
pub mod error_mapper;
pub mod rbac_repository;
pub mod seed;
pub mod token_repository;
pub mod user_repository;

pub use audit_log_repository::PostgresAuditLogRepository;
pub use rbac_repository::PostgresRbacRepository;
pub use token_repository::PostgresActionTokenRepository;
pub use user_repository::PostgresUserRepository;
