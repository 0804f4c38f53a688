//! Application services and ports for the Clavis authorization engine.

#![forbid(unsafe_code)]

mod assignment_service;
mod audit_trail;
mod authorization_service;
mod permission_set_cache;

pub use assignment_service::{
    AssignmentService, LegacyProfile, MigrationFailure, MigrationReport, NewRoleAssignment,
    RoleAssignmentRepository,
};
pub use audit_trail::{AuditDetail, AuditEvent, AuditRepository, AuditTrail};
pub use authorization_service::{AuthorizationService, PermissionCatalogRepository};
pub use permission_set_cache::{
    CacheStats, DEFAULT_CACHE_TTL, DistributedPermissionSetCache, PermissionSetCache,
};
