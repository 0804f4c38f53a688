use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clavis_core::{AppResult, PrincipalId};
use clavis_domain::{AuditAction, Decision, ResolutionSource};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Structured payload attached to one audit event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditDetail {
    /// Outcome of a single permission check.
    PermissionCheck {
        /// Requested `resource:action` permission.
        permission: String,
        /// Grant or deny outcome.
        decision: Decision,
        /// Tier the resolved set was served from.
        source: ResolutionSource,
        /// Wall-clock resolution time in milliseconds.
        elapsed_ms: u64,
        /// Error marker when resolution failed closed. Never carries the
        /// raw failure payload.
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// A role grant or revocation.
    RoleChange {
        /// Affected role name.
        role_name: String,
        /// Principal that performed the mutation.
        changed_by: PrincipalId,
        /// Expiry attached to the grant, when any.
        #[serde(skip_serializing_if = "Option::is_none")]
        expires_at: Option<DateTime<Utc>>,
    },
    /// An explicit administrative cache purge.
    CacheInvalidation {
        /// Principal that requested the purge.
        requested_by: PrincipalId,
    },
}

/// Immutable audit event emitted by the authorization engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Principal the event is about.
    pub principal_id: PrincipalId,
    /// Stable audit action identifier.
    pub action: AuditAction,
    /// Structured event payload.
    pub detail: AuditDetail,
}

/// Port for persisting append-only audit events.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Persists one audit event.
    async fn append_event(&self, event: AuditEvent) -> AppResult<()>;
}

/// Best-effort audit emitter.
///
/// A failing sink must never block or fail the operation being audited;
/// failures are reported through the logging channel instead.
#[derive(Clone)]
pub struct AuditTrail {
    repository: Arc<dyn AuditRepository>,
}

impl AuditTrail {
    /// Creates an emitter over the given sink.
    #[must_use]
    pub fn new(repository: Arc<dyn AuditRepository>) -> Self {
        Self { repository }
    }

    /// Records one event, downgrading sink failures to a warning.
    pub async fn record(&self, event: AuditEvent) {
        let principal_id = event.principal_id;
        let action = event.action;

        if let Err(error) = self.repository.append_event(event).await {
            warn!(
                principal_id = %principal_id,
                action = action.as_str(),
                error = %error,
                "audit sink unavailable, dropping event"
            );
        }
    }

    /// Records the outcome of one permission check.
    pub async fn record_check(
        &self,
        principal_id: PrincipalId,
        permission: &str,
        decision: Decision,
        source: ResolutionSource,
        elapsed: Duration,
        error_marker: Option<&str>,
    ) {
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

        self.record(AuditEvent {
            principal_id,
            action: AuditAction::PermissionChecked,
            detail: AuditDetail::PermissionCheck {
                permission: permission.to_owned(),
                decision,
                source,
                elapsed_ms,
                error: error_marker.map(str::to_owned),
            },
        })
        .await;
    }
}
