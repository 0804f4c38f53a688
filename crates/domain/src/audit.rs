use serde::{Deserialize, Serialize};

/// Stable audit actions emitted by the authorization engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Emitted for every permission check, granted or denied.
    PermissionChecked,
    /// Emitted when a role is assigned to a principal.
    RoleAssigned,
    /// Emitted when a role assignment is revoked.
    RoleRemoved,
    /// Emitted when a principal's cached permission set is explicitly purged.
    CacheInvalidated,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PermissionChecked => "authz.permission.checked",
            Self::RoleAssigned => "authz.role.assigned",
            Self::RoleRemoved => "authz.role.removed",
            Self::CacheInvalidated => "authz.cache.invalidated",
        }
    }
}

/// Outcome of a permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// The requested permission is held by the principal.
    Granted,
    /// The requested permission is absent or resolution failed closed.
    Denied,
}

impl Decision {
    /// Returns a stable storage value for this decision.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Granted => "granted",
            Self::Denied => "denied",
        }
    }

    /// Returns whether the decision allows the action.
    #[must_use]
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// Where a resolved permission set was obtained from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    /// Served from the in-process or distributed cache tier.
    Cache,
    /// Recomputed from the permission catalog and assignment store.
    Catalog,
}

impl ResolutionSource {
    /// Returns a stable storage value for this source.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Catalog => "catalog",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AuditAction, Decision};

    #[test]
    fn audit_actions_have_stable_storage_values() {
        assert_eq!(AuditAction::RoleAssigned.as_str(), "authz.role.assigned");
        assert_eq!(
            AuditAction::PermissionChecked.as_str(),
            "authz.permission.checked"
        );
    }

    #[test]
    fn decision_granted_flag_matches_variant() {
        assert!(Decision::Granted.is_granted());
        assert!(!Decision::Denied.is_granted());
    }
}
