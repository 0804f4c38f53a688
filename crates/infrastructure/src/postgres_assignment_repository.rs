use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use clavis_application::{NewRoleAssignment, RoleAssignmentRepository};
use clavis_core::{AppError, AppResult, PrincipalId, RoleId};
use clavis_domain::{Role, RoleAssignment};

/// PostgreSQL-backed assignment store adapter.
#[derive(Clone)]
pub struct PostgresAssignmentRepository {
    pool: PgPool,
}

impl PostgresAssignmentRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct RoleRow {
    id: i64,
    name: String,
    display_name: String,
    level: i32,
    parent_role_id: Option<i64>,
    is_system: bool,
    is_active: bool,
}

impl From<RoleRow> for Role {
    fn from(row: RoleRow) -> Self {
        Self {
            id: RoleId::new(row.id),
            name: row.name,
            display_name: row.display_name,
            level: row.level,
            parent_role_id: row.parent_role_id.map(RoleId::new),
            is_system: row.is_system,
            is_active: row.is_active,
        }
    }
}

#[derive(Debug, FromRow)]
struct AssignmentRow {
    principal_id: i64,
    role_id: i64,
    role_name: String,
    assigned_by: i64,
    assigned_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    is_active: bool,
}

impl From<AssignmentRow> for RoleAssignment {
    fn from(row: AssignmentRow) -> Self {
        Self {
            principal_id: PrincipalId::new(row.principal_id),
            role_id: RoleId::new(row.role_id),
            role_name: row.role_name,
            assigned_by: PrincipalId::new(row.assigned_by),
            assigned_at: row.assigned_at,
            expires_at: row.expires_at,
            is_active: row.is_active,
        }
    }
}

#[async_trait]
impl RoleAssignmentRepository for PostgresAssignmentRepository {
    async fn find_active_role_by_name(&self, role_name: &str) -> AppResult<Option<Role>> {
        let row = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT id, name, display_name, level, parent_role_id, is_system, is_active
            FROM roles
            WHERE name = $1 AND is_active
            LIMIT 1
            "#,
        )
        .bind(role_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::StoreUnavailable(format!("failed to resolve role '{role_name}': {error}"))
        })?;

        Ok(row.map(Role::from))
    }

    async fn upsert_assignment(&self, assignment: NewRoleAssignment) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_role_assignments (
                principal_id,
                role_id,
                assigned_by,
                assigned_at,
                expires_at,
                is_active
            )
            VALUES ($1, $2, $3, now(), $4, true)
            ON CONFLICT (principal_id, role_id) DO UPDATE
            SET
                assigned_by = EXCLUDED.assigned_by,
                assigned_at = now(),
                expires_at = EXCLUDED.expires_at,
                is_active = true
            "#,
        )
        .bind(assignment.principal_id.as_i64())
        .bind(assignment.role_id.as_i64())
        .bind(assignment.assigned_by.as_i64())
        .bind(assignment.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::StoreUnavailable(format!("failed to upsert role assignment: {error}"))
        })?;

        Ok(())
    }

    async fn deactivate_assignment(
        &self,
        principal_id: PrincipalId,
        role_name: &str,
    ) -> AppResult<bool> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE user_role_assignments AS assignments
            SET is_active = false
            FROM roles
            WHERE roles.id = assignments.role_id
                AND assignments.principal_id = $1
                AND roles.name = $2
                AND assignments.is_active
            "#,
        )
        .bind(principal_id.as_i64())
        .bind(role_name)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::StoreUnavailable(format!(
                "failed to deactivate role assignment: {error}"
            ))
        })?
        .rows_affected();

        Ok(rows_affected > 0)
    }

    async fn list_effective_roles(&self, principal_id: PrincipalId) -> AppResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT
                roles.id,
                roles.name,
                roles.display_name,
                roles.level,
                roles.parent_role_id,
                roles.is_system,
                roles.is_active
            FROM user_role_assignments AS assignments
            INNER JOIN roles
                ON roles.id = assignments.role_id
            WHERE assignments.principal_id = $1
                AND assignments.is_active
                AND (assignments.expires_at IS NULL OR assignments.expires_at > now())
                AND roles.is_active
            ORDER BY roles.level DESC, roles.name
            "#,
        )
        .bind(principal_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::StoreUnavailable(format!(
                "failed to list effective roles for principal '{principal_id}': {error}"
            ))
        })?;

        Ok(rows.into_iter().map(Role::from).collect())
    }

    async fn list_assignments(
        &self,
        principal_id: PrincipalId,
    ) -> AppResult<Vec<RoleAssignment>> {
        let rows = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT
                assignments.principal_id,
                assignments.role_id,
                roles.name AS role_name,
                assignments.assigned_by,
                assignments.assigned_at,
                assignments.expires_at,
                assignments.is_active
            FROM user_role_assignments AS assignments
            INNER JOIN roles
                ON roles.id = assignments.role_id
            WHERE assignments.principal_id = $1
            ORDER BY assignments.assigned_at, roles.name
            "#,
        )
        .bind(principal_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::StoreUnavailable(format!(
                "failed to list assignments for principal '{principal_id}': {error}"
            ))
        })?;

        Ok(rows.into_iter().map(RoleAssignment::from).collect())
    }
}

#[cfg(test)]
mod tests;
