use std::fmt::{Display, Formatter};
use std::str::FromStr;

use clavis_core::{AppError, PrincipalId};
use serde::{Deserialize, Serialize};

/// Segment reserved for ownership-scoped catalog grants.
const OWN_SCOPE: &str = "own";

/// Segment matching any resource or action in a catalog grant.
const WILDCARD: &str = "*";

/// Canonical permission string of the form `resource:action`, optionally
/// suffixed with `:own` for ownership-scoped catalog grants.
///
/// Catalog entries may use `*` for the resource or action segment. A
/// *requested* permission is always the plain two-segment form; see
/// [`PermissionKey::parse_request`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionKey(String);

impl PermissionKey {
    /// Parses a catalog permission value, normalising to lower case.
    pub fn parse(value: &str) -> Result<Self, AppError> {
        let normalised = value.trim().to_ascii_lowercase();
        let segments: Vec<&str> = normalised.split(':').collect();

        match segments.as_slice() {
            [resource, action] => {
                validate_segment(resource, value)?;
                validate_segment(action, value)?;
            }
            [resource, action, scope] => {
                validate_segment(resource, value)?;
                validate_segment(action, value)?;
                if *scope != OWN_SCOPE {
                    return Err(AppError::Validation(format!(
                        "unknown permission scope in '{value}'"
                    )));
                }
                if *resource == WILDCARD || *action == WILDCARD {
                    return Err(AppError::Validation(format!(
                        "ownership-scoped permission '{value}' must not contain wildcards"
                    )));
                }
            }
            _ => {
                return Err(AppError::Validation(format!(
                    "permission '{value}' must be 'resource:action' or 'resource:action:own'"
                )));
            }
        }

        Ok(Self(normalised))
    }

    /// Parses a requested permission: exactly `resource:action`, no wildcards.
    ///
    /// Wildcard and `:own` forms only make sense as catalog grants; a request
    /// carrying one is malformed and resolves to a deny upstream.
    pub fn parse_request(value: &str) -> Result<Self, AppError> {
        let key = Self::parse(value)?;
        if key.is_own_scoped() {
            return Err(AppError::Validation(format!(
                "requested permission '{value}' must not carry the ':own' scope"
            )));
        }
        if key.resource() == WILDCARD || key.action() == WILDCARD {
            return Err(AppError::Validation(format!(
                "requested permission '{value}' must not contain wildcards"
            )));
        }

        Ok(key)
    }

    /// Returns the canonical string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the resource segment.
    #[must_use]
    pub fn resource(&self) -> &str {
        self.0.split(':').next().unwrap_or_default()
    }

    /// Returns the action segment.
    #[must_use]
    pub fn action(&self) -> &str {
        self.0.split(':').nth(1).unwrap_or_default()
    }

    /// Returns whether this is an ownership-scoped catalog grant.
    #[must_use]
    pub fn is_own_scoped(&self) -> bool {
        self.0.split(':').nth(2) == Some(OWN_SCOPE)
    }
}

impl FromStr for PermissionKey {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl Display for PermissionKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

fn validate_segment(segment: &str, full_value: &str) -> Result<(), AppError> {
    if segment.is_empty() {
        return Err(AppError::Validation(format!(
            "permission '{full_value}' contains an empty segment"
        )));
    }

    Ok(())
}

/// Per-request context supplied by the request layer alongside a check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessContext {
    /// Principal performing the request, as seen by the caller.
    pub user_id: Option<PrincipalId>,
    /// Principal owning the targeted resource, when known.
    pub owner_id: Option<PrincipalId>,
    /// Transport method label, carried for audit purposes only.
    pub method: Option<String>,
    /// Transport path label, carried for audit purposes only.
    pub path: Option<String>,
}

impl AccessContext {
    /// Returns a context for a caller acting on a resource owned by `owner_id`.
    #[must_use]
    pub fn for_owner(user_id: PrincipalId, owner_id: PrincipalId) -> Self {
        Self {
            user_id: Some(user_id),
            owner_id: Some(owner_id),
            method: None,
            path: None,
        }
    }

    /// Returns whether the caller is acting on their own data.
    #[must_use]
    pub fn is_self_scoped(&self) -> bool {
        matches!(
            (self.user_id, self.owner_id),
            (Some(user_id), Some(owner_id)) if user_id == owner_id
        )
    }
}

#[cfg(test)]
mod tests {
    use clavis_core::PrincipalId;

    use super::{AccessContext, PermissionKey};

    #[test]
    fn parse_accepts_plain_permission() {
        let key = PermissionKey::parse("timerecords:create");
        assert!(key.is_ok());
    }

    #[test]
    fn parse_normalises_case_and_whitespace() {
        let key = PermissionKey::parse("  TimeRecords:Create ");
        assert_eq!(
            key.map(|key| key.as_str().to_owned()).unwrap_or_default(),
            "timerecords:create"
        );
    }

    #[test]
    fn parse_accepts_wildcard_and_own_forms() {
        assert!(PermissionKey::parse("*:*").is_ok());
        assert!(PermissionKey::parse("timerecords:*").is_ok());
        assert!(PermissionKey::parse("*:read").is_ok());
        assert!(PermissionKey::parse("timerecords:read:own").is_ok());
    }

    #[test]
    fn parse_rejects_malformed_values() {
        assert!(PermissionKey::parse("timerecords").is_err());
        assert!(PermissionKey::parse("timerecords:").is_err());
        assert!(PermissionKey::parse(":create").is_err());
        assert!(PermissionKey::parse("a:b:c").is_err());
        assert!(PermissionKey::parse("a:b:own:d").is_err());
        assert!(PermissionKey::parse("*:*:own").is_err());
    }

    #[test]
    fn parse_request_rejects_catalog_only_forms() {
        assert!(PermissionKey::parse_request("timerecords:create").is_ok());
        assert!(PermissionKey::parse_request("*:*").is_err());
        assert!(PermissionKey::parse_request("timerecords:*").is_err());
        assert!(PermissionKey::parse_request("timerecords:read:own").is_err());
    }

    #[test]
    fn segments_are_exposed() {
        let Ok(key) = PermissionKey::parse("timerecords:read:own") else {
            panic!("expected valid permission");
        };
        assert_eq!(key.resource(), "timerecords");
        assert_eq!(key.action(), "read");
        assert!(key.is_own_scoped());
    }

    #[test]
    fn context_is_self_scoped_only_on_matching_ids() {
        let own = AccessContext::for_owner(PrincipalId::new(7), PrincipalId::new(7));
        assert!(own.is_self_scoped());

        let other = AccessContext::for_owner(PrincipalId::new(7), PrincipalId::new(8));
        assert!(!other.is_self_scoped());

        assert!(!AccessContext::default().is_self_scoped());
    }
}
