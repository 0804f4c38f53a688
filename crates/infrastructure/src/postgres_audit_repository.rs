use async_trait::async_trait;
use sqlx::PgPool;

use clavis_application::{AuditEvent, AuditRepository};
use clavis_core::{AppError, AppResult};

/// PostgreSQL-backed append-only audit repository.
#[derive(Clone)]
pub struct PostgresAuditRepository {
    pool: PgPool,
}

impl PostgresAuditRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for PostgresAuditRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        let detail = serde_json::to_string(&event.detail).map_err(|error| {
            AppError::Internal(format!("failed to encode audit detail: {error}"))
        })?;

        sqlx::query(
            r#"
            INSERT INTO audit_log_entries (principal_id, action, detail)
            VALUES ($1, $2, $3::jsonb)
            "#,
        )
        .bind(event.principal_id.as_i64())
        .bind(event.action.as_str())
        .bind(detail)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::AuditUnavailable(format!("failed to append audit event: {error}"))
        })?;

        Ok(())
    }
}
