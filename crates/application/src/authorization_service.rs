use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use clavis_core::{AppResult, PrincipalId};
use clavis_domain::{
    AccessContext, Decision, PermissionKey, ResolutionSource, ResolvedPermissionSet,
};
use tracing::warn;

use crate::{AuditTrail, PermissionSetCache};

/// Repository port for the permission catalog and assignment store.
#[async_trait]
pub trait PermissionCatalogRepository: Send + Sync {
    /// Computes the flattened permission set from all currently effective
    /// assignments of a principal. An unknown principal resolves to the
    /// empty set, not an error.
    async fn load_resolved_set(
        &self,
        principal_id: PrincipalId,
    ) -> AppResult<ResolvedPermissionSet>;
}

/// The resolution engine: decides permission checks against cached,
/// flattened role grants.
#[derive(Clone)]
pub struct AuthorizationService {
    catalog: Arc<dyn PermissionCatalogRepository>,
    cache: Arc<PermissionSetCache>,
    audit: AuditTrail,
}

impl AuthorizationService {
    /// Creates the engine from its catalog, cache, and audit collaborators.
    #[must_use]
    pub fn new(
        catalog: Arc<dyn PermissionCatalogRepository>,
        cache: Arc<PermissionSetCache>,
        audit: AuditTrail,
    ) -> Self {
        Self {
            catalog,
            cache,
            audit,
        }
    }

    /// Decides whether `principal_id` may perform `permission`.
    ///
    /// Never errors: absence of the permission is an ordinary deny, and an
    /// unreachable store fails closed with an audited error marker. Every
    /// call, granted or denied, produces exactly one audit record.
    pub async fn check(
        &self,
        principal_id: PrincipalId,
        permission: &str,
        context: &AccessContext,
    ) -> bool {
        let started = Instant::now();

        let requested = match PermissionKey::parse_request(permission) {
            Ok(requested) => requested,
            Err(error) => {
                warn!(
                    principal_id = %principal_id,
                    permission,
                    error = %error,
                    "malformed requested permission, denying"
                );
                self.audit
                    .record_check(
                        principal_id,
                        permission,
                        Decision::Denied,
                        ResolutionSource::Catalog,
                        started.elapsed(),
                        Some("malformed_permission"),
                    )
                    .await;
                return false;
            }
        };

        let (set, source) = match self.resolved_set(principal_id).await {
            Ok(resolved) => resolved,
            Err(error) => {
                warn!(
                    principal_id = %principal_id,
                    permission = requested.as_str(),
                    error = %error,
                    "permission resolution failed, denying"
                );
                self.audit
                    .record_check(
                        principal_id,
                        requested.as_str(),
                        Decision::Denied,
                        ResolutionSource::Catalog,
                        started.elapsed(),
                        Some("store_error"),
                    )
                    .await;
                return false;
            }
        };

        let decision = if set.allows(&requested, context) {
            Decision::Granted
        } else {
            Decision::Denied
        };

        self.audit
            .record_check(
                principal_id,
                requested.as_str(),
                decision,
                source,
                started.elapsed(),
                None,
            )
            .await;

        decision.is_granted()
    }

    /// Returns the principal's resolved set and the tier it came from.
    ///
    /// On a cache miss the set is recomputed from the catalog and written
    /// back to both cache tiers.
    pub async fn resolved_set(
        &self,
        principal_id: PrincipalId,
    ) -> AppResult<(ResolvedPermissionSet, ResolutionSource)> {
        if let Some(set) = self.cache.get(principal_id).await {
            return Ok((set, ResolutionSource::Cache));
        }

        let set = self.catalog.load_resolved_set(principal_id).await?;
        self.cache.store(principal_id, set.clone()).await;

        Ok((set, ResolutionSource::Catalog))
    }
}
