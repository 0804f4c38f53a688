//! Shared primitives for all Rust crates in Clavis.

#![forbid(unsafe_code)]

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across Clavis crates.
pub type AppResult<T> = Result<T, AppError>;

/// Principal identifier issued by the upstream identity store.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PrincipalId(i64);

impl PrincipalId {
    /// Creates a principal identifier from a raw store value.
    #[must_use]
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the underlying store value.
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for PrincipalId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Role identifier assigned by the permission catalog.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoleId(i64);

impl RoleId {
    /// Creates a role identifier from a raw store value.
    #[must_use]
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the underlying store value.
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for RoleId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Grant referenced a role that does not exist or is inactive.
    #[error("role '{0}' was not found or is inactive")]
    RoleNotFound(String),

    /// The permission catalog or assignment store cannot be reached.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The distributed cache tier cannot be reached.
    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    /// The audit sink rejected or could not accept an event.
    #[error("audit sink unavailable: {0}")]
    AuditUnavailable(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::{AppError, PrincipalId};

    #[test]
    fn principal_id_formats_as_store_value() {
        let principal_id = PrincipalId::new(42);
        assert_eq!(principal_id.to_string(), "42");
    }

    #[test]
    fn role_not_found_mentions_role_name() {
        let error = AppError::RoleNotFound("RH".to_owned());
        assert!(error.to_string().contains("RH"));
    }
}
