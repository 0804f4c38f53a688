//! Infrastructure adapters for the Clavis application ports.

#![forbid(unsafe_code)]

mod postgres_assignment_repository;
mod postgres_audit_repository;
mod postgres_catalog_repository;
mod redis_permission_set_cache;

pub use postgres_assignment_repository::PostgresAssignmentRepository;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_catalog_repository::PostgresCatalogRepository;
pub use redis_permission_set_cache::RedisPermissionSetCache;
