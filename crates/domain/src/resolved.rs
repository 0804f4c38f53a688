use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::access::{AccessContext, PermissionKey};

/// Flattened permission view derived from all effective assignments of one
/// principal. Computed fresh on every cache miss, never patched in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPermissionSet {
    /// Canonical permission strings, including wildcard and `:own` grants.
    pub permissions: BTreeSet<String>,
    /// Names of the contributing roles.
    pub roles: Vec<String>,
    /// Highest privilege level among the contributing roles.
    pub max_level: i32,
}

impl ResolvedPermissionSet {
    /// Returns the empty set resolved for a principal without effective roles.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns whether the set contains the named role.
    #[must_use]
    pub fn has_role(&self, role_name: &str) -> bool {
        self.roles.iter().any(|name| name == role_name)
    }

    /// Decides a requested permission against this set.
    ///
    /// The rules are evaluated in a fixed precedence order; the first match
    /// wins and anything else is a deny:
    ///
    /// 1. universal grant `*:*`
    /// 2. exact `resource:action`
    /// 3. resource wildcard `resource:*`
    /// 4. action wildcard `*:action`
    /// 5. ownership grant `resource:action:own`, only when the context shows
    ///    the caller acting on their own data
    #[must_use]
    pub fn allows(&self, requested: &PermissionKey, context: &AccessContext) -> bool {
        if self.permissions.contains("*:*") {
            return true;
        }

        if self.permissions.contains(requested.as_str()) {
            return true;
        }

        if self
            .permissions
            .contains(&format!("{}:*", requested.resource()))
        {
            return true;
        }

        if self
            .permissions
            .contains(&format!("*:{}", requested.action()))
        {
            return true;
        }

        if context.is_self_scoped()
            && self
                .permissions
                .contains(&format!("{}:own", requested.as_str()))
        {
            return true;
        }

        false
    }
}
