use chrono::{DateTime, Utc};
use clavis_core::{PrincipalId, RoleId};
use serde::{Deserialize, Serialize};

/// Role definition from the permission catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Stable role identifier.
    pub id: RoleId,
    /// Unique role name, e.g. `ADMINISTRADOR`.
    pub name: String,
    /// Human-readable display name.
    pub display_name: String,
    /// Privilege level; higher means more privileged. Informational only,
    /// never consulted by the matching algorithm.
    pub level: i32,
    /// Optional parent role in the display hierarchy.
    pub parent_role_id: Option<RoleId>,
    /// System roles are seeded once and cannot be edited or deleted.
    pub is_system: bool,
    /// Deactivated roles stop granting but are kept for referential history.
    pub is_active: bool,
}

/// Assignment row linking a principal to a role.
///
/// Rows are never physically deleted; revocation flips `is_active` so the
/// audit history stays reconstructable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    /// Principal holding the role.
    pub principal_id: PrincipalId,
    /// Assigned role identifier.
    pub role_id: RoleId,
    /// Assigned role name.
    pub role_name: String,
    /// Principal that performed the grant.
    pub assigned_by: PrincipalId,
    /// Grant timestamp.
    pub assigned_at: DateTime<Utc>,
    /// Optional expiry; the assignment lapses without explicit action.
    pub expires_at: Option<DateTime<Utc>>,
    /// Logical-revocation flag.
    pub is_active: bool,
}

impl RoleAssignment {
    /// Returns whether the assignment contributes grants at `now`.
    #[must_use]
    pub fn is_effective_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.is_none_or(|expires_at| expires_at > now)
    }
}
