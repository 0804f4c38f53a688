use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clavis_core::{AppError, AppResult, PrincipalId, RoleId};
use clavis_domain::{AuditAction, Role, RoleAssignment};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{AuditDetail, AuditEvent, AuditTrail, PermissionSetCache};

/// Upsert payload for one assignment row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRoleAssignment {
    /// Principal receiving the role.
    pub principal_id: PrincipalId,
    /// Role being granted.
    pub role_id: RoleId,
    /// Principal performing the grant.
    pub assigned_by: PrincipalId,
    /// Optional expiry for temporary grants.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Repository port for role assignment rows.
#[async_trait]
pub trait RoleAssignmentRepository: Send + Sync {
    /// Looks up an active role by name; inactive roles resolve to `None`.
    async fn find_active_role_by_name(&self, role_name: &str) -> AppResult<Option<Role>>;

    /// Inserts or re-activates the unique (principal, role) assignment row.
    async fn upsert_assignment(&self, assignment: NewRoleAssignment) -> AppResult<()>;

    /// Deactivates the active assignment for (principal, role name).
    /// Returns whether a row was actually deactivated.
    async fn deactivate_assignment(
        &self,
        principal_id: PrincipalId,
        role_name: &str,
    ) -> AppResult<bool>;

    /// Lists roles from assignments that are active and unexpired.
    async fn list_effective_roles(&self, principal_id: PrincipalId) -> AppResult<Vec<Role>>;

    /// Lists every assignment row for a principal, revoked ones included.
    async fn list_assignments(
        &self,
        principal_id: PrincipalId,
    ) -> AppResult<Vec<RoleAssignment>>;
}

/// One entry of the legacy single-profile model fed into the bulk migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyProfile {
    /// Principal carrying the legacy profile.
    pub principal_id: PrincipalId,
    /// Legacy profile name; must match a role name in the catalog.
    pub profile: String,
}

/// Per-principal failure recorded during a bulk migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationFailure {
    /// Principal whose migration was skipped.
    pub principal_id: PrincipalId,
    /// Failure description.
    pub reason: String,
}

/// Tally of a bulk legacy-profile migration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Principals migrated successfully.
    pub migrated: u32,
    /// Principals skipped, with the recorded reason.
    pub failures: Vec<MigrationFailure>,
}

/// Orchestrates role grants and revocations: store write, synchronous cache
/// invalidation, audit record, in that order.
#[derive(Clone)]
pub struct AssignmentService {
    assignments: Arc<dyn RoleAssignmentRepository>,
    cache: Arc<PermissionSetCache>,
    audit: AuditTrail,
}

impl AssignmentService {
    /// Creates the service from its store, cache, and audit collaborators.
    #[must_use]
    pub fn new(
        assignments: Arc<dyn RoleAssignmentRepository>,
        cache: Arc<PermissionSetCache>,
        audit: AuditTrail,
    ) -> Self {
        Self {
            assignments,
            cache,
            audit,
        }
    }

    /// Grants `role_name` to a principal.
    ///
    /// Fails with [`AppError::RoleNotFound`] when the role does not exist or
    /// is inactive. Granting an already-held role re-activates the existing
    /// assignment row instead of duplicating it. The principal's cache entry
    /// is invalidated before the grant is acknowledged.
    pub async fn grant(
        &self,
        principal_id: PrincipalId,
        role_name: &str,
        granted_by: PrincipalId,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        let role = self
            .assignments
            .find_active_role_by_name(role_name)
            .await?
            .ok_or_else(|| AppError::RoleNotFound(role_name.to_owned()))?;

        self.assignments
            .upsert_assignment(NewRoleAssignment {
                principal_id,
                role_id: role.id,
                assigned_by: granted_by,
                expires_at,
            })
            .await?;

        self.cache.invalidate(principal_id).await;

        self.audit
            .record(AuditEvent {
                principal_id,
                action: AuditAction::RoleAssigned,
                detail: AuditDetail::RoleChange {
                    role_name: role.name.clone(),
                    changed_by: granted_by,
                    expires_at,
                },
            })
            .await;

        info!(
            principal_id = %principal_id,
            role = role.name.as_str(),
            granted_by = %granted_by,
            "role granted"
        );

        Ok(())
    }

    /// Revokes `role_name` from a principal.
    ///
    /// The assignment row is deactivated, never deleted. Revoking a role the
    /// principal does not actively hold is a no-op, not an error.
    pub async fn revoke(
        &self,
        principal_id: PrincipalId,
        role_name: &str,
        revoked_by: PrincipalId,
    ) -> AppResult<()> {
        let deactivated = self
            .assignments
            .deactivate_assignment(principal_id, role_name)
            .await?;

        if !deactivated {
            debug!(
                principal_id = %principal_id,
                role = role_name,
                "revoke without an active assignment, nothing to do"
            );
            return Ok(());
        }

        self.cache.invalidate(principal_id).await;

        self.audit
            .record(AuditEvent {
                principal_id,
                action: AuditAction::RoleRemoved,
                detail: AuditDetail::RoleChange {
                    role_name: role_name.to_owned(),
                    changed_by: revoked_by,
                    expires_at: None,
                },
            })
            .await;

        info!(
            principal_id = %principal_id,
            role = role_name,
            revoked_by = %revoked_by,
            "role revoked"
        );

        Ok(())
    }

    /// Returns the roles from the principal's effective assignments.
    pub async fn list_effective_roles(
        &self,
        principal_id: PrincipalId,
    ) -> AppResult<Vec<Role>> {
        self.assignments.list_effective_roles(principal_id).await
    }

    /// Returns every assignment row for a principal, preserved revocations
    /// included.
    pub async fn list_assignments(
        &self,
        principal_id: PrincipalId,
    ) -> AppResult<Vec<RoleAssignment>> {
        self.assignments.list_assignments(principal_id).await
    }

    /// Purges the principal's cached permission set on administrative
    /// request and records the purge in the audit trail.
    pub async fn invalidate_cache(
        &self,
        principal_id: PrincipalId,
        requested_by: PrincipalId,
    ) {
        self.cache.invalidate(principal_id).await;

        self.audit
            .record(AuditEvent {
                principal_id,
                action: AuditAction::CacheInvalidated,
                detail: AuditDetail::CacheInvalidation { requested_by },
            })
            .await;
    }

    /// Migrates principals from the legacy single-profile model.
    ///
    /// Each principal is processed independently: a failure is recorded in
    /// the tally and skipped, never aborting the batch. The legacy profile
    /// table is consumed here exactly once; resolution never falls back to
    /// it at runtime.
    pub async fn migrate_legacy_profiles(
        &self,
        profiles: Vec<LegacyProfile>,
        migrated_by: PrincipalId,
    ) -> MigrationReport {
        let mut report = MigrationReport::default();

        for entry in profiles {
            match self
                .grant(entry.principal_id, entry.profile.as_str(), migrated_by, None)
                .await
            {
                Ok(()) => report.migrated += 1,
                Err(error) => {
                    warn!(
                        principal_id = %entry.principal_id,
                        profile = entry.profile.as_str(),
                        error = %error,
                        "skipping principal during legacy profile migration"
                    );
                    report.failures.push(MigrationFailure {
                        principal_id: entry.principal_id,
                        reason: error.to_string(),
                    });
                }
            }
        }

        info!(
            migrated = report.migrated,
            failed = report.failures.len(),
            "legacy profile migration finished"
        );

        report
    }
}
