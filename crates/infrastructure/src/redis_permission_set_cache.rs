//! Redis-backed distributed tier of the permission set cache.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::debug;

use clavis_application::DistributedPermissionSetCache;
use clavis_core::{AppError, AppResult, PrincipalId};
use clavis_domain::ResolvedPermissionSet;

/// Redis implementation of the distributed permission set cache port.
#[derive(Clone)]
pub struct RedisPermissionSetCache {
    client: redis::Client,
    key_prefix: String,
}

impl RedisPermissionSetCache {
    /// Creates a cache adapter with a configured Redis client and key prefix.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, principal_id: PrincipalId) -> String {
        format!("{}:principal:{principal_id}", self.key_prefix)
    }

    /// Slot a session-owning request layer keeps its per-principal copy in.
    fn session_key_for(&self, principal_id: PrincipalId) -> String {
        format!("{}:session:{principal_id}", self.key_prefix)
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| {
                AppError::CacheUnavailable(format!("failed to connect to redis: {error}"))
            })
    }
}

#[async_trait]
impl DistributedPermissionSetCache for RedisPermissionSetCache {
    async fn get(&self, principal_id: PrincipalId) -> AppResult<Option<ResolvedPermissionSet>> {
        let mut connection = self.connection().await?;

        let encoded: Option<String> =
            connection.get(self.key_for(principal_id)).await.map_err(|error| {
                AppError::CacheUnavailable(format!(
                    "failed to read permission set cache entry: {error}"
                ))
            })?;

        encoded
            .as_deref()
            .map(|value| {
                serde_json::from_str(value).map_err(|error| {
                    AppError::Internal(format!(
                        "invalid permission set cache value for principal '{principal_id}': {error}"
                    ))
                })
            })
            .transpose()
    }

    async fn set(
        &self,
        principal_id: PrincipalId,
        set: &ResolvedPermissionSet,
        ttl: Duration,
    ) -> AppResult<()> {
        if ttl.is_zero() {
            return Ok(());
        }

        let value = serde_json::to_string(set).map_err(|error| {
            AppError::Internal(format!("failed to encode permission set: {error}"))
        })?;

        let mut connection = self.connection().await?;
        connection
            .set_ex(self.key_for(principal_id), value, ttl.as_secs())
            .await
            .map_err(|error| {
                AppError::CacheUnavailable(format!(
                    "failed to write permission set cache entry: {error}"
                ))
            })
    }

    async fn invalidate(&self, principal_id: PrincipalId) -> AppResult<()> {
        let mut connection = self.connection().await?;

        let removed: i64 = connection
            .del(vec![
                self.key_for(principal_id),
                self.session_key_for(principal_id),
            ])
            .await
            .map_err(|error| {
                AppError::CacheUnavailable(format!(
                    "failed to invalidate permission set cache entry: {error}"
                ))
            })?;

        debug!(
            principal_id = %principal_id,
            removed,
            "purged distributed and session cache entries"
        );

        Ok(())
    }
}
