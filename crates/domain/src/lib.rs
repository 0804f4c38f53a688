//! Domain types for the Clavis authorization engine.

#![forbid(unsafe_code)]

mod access;
mod audit;
mod resolved;
mod role;

pub use access::{AccessContext, PermissionKey};
pub use audit::{AuditAction, Decision, ResolutionSource};
pub use resolved::ResolvedPermissionSet;
pub use role::{Role, RoleAssignment};
