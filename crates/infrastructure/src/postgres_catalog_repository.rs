use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use clavis_application::PermissionCatalogRepository;
use clavis_core::{AppError, AppResult, PrincipalId};
use clavis_domain::ResolvedPermissionSet;

/// PostgreSQL-backed permission catalog adapter.
///
/// Flattens every currently effective assignment of a principal into one
/// [`ResolvedPermissionSet`] in a single round trip.
#[derive(Clone)]
pub struct PostgresCatalogRepository {
    pool: PgPool,
}

impl PostgresCatalogRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct GrantRow {
    role_name: String,
    role_level: i32,
    resource_code: Option<String>,
    action_code: Option<String>,
    permission_scope: Option<String>,
}

#[async_trait]
impl PermissionCatalogRepository for PostgresCatalogRepository {
    async fn load_resolved_set(
        &self,
        principal_id: PrincipalId,
    ) -> AppResult<ResolvedPermissionSet> {
        let rows = sqlx::query_as::<_, GrantRow>(
            r#"
            SELECT
                roles.name AS role_name,
                roles.level AS role_level,
                resources.code AS resource_code,
                actions.code AS action_code,
                permissions.scope AS permission_scope
            FROM user_role_assignments AS assignments
            INNER JOIN roles
                ON roles.id = assignments.role_id
            LEFT JOIN role_permissions
                ON role_permissions.role_id = roles.id
            LEFT JOIN permissions
                ON permissions.id = role_permissions.permission_id
            LEFT JOIN resources
                ON resources.id = permissions.resource_id
            LEFT JOIN actions
                ON actions.id = permissions.action_id
            WHERE assignments.principal_id = $1
                AND assignments.is_active
                AND (assignments.expires_at IS NULL OR assignments.expires_at > now())
                AND roles.is_active
            ORDER BY roles.name
            "#,
        )
        .bind(principal_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::StoreUnavailable(format!(
                "failed to load permission grants for principal '{principal_id}': {error}"
            ))
        })?;

        aggregate_resolved_set(rows)
    }
}

fn aggregate_resolved_set(rows: Vec<GrantRow>) -> AppResult<ResolvedPermissionSet> {
    let mut set = ResolvedPermissionSet::empty();

    for row in rows {
        if !set.has_role(row.role_name.as_str()) {
            set.roles.push(row.role_name.clone());
            set.max_level = set.max_level.max(row.role_level);
        }

        let (Some(resource_code), Some(action_code)) = (row.resource_code, row.action_code)
        else {
            // Role without grants; it still contributes name and level.
            continue;
        };

        let permission = match row.permission_scope {
            Some(scope) => format!("{resource_code}:{action_code}:{scope}"),
            None => format!("{resource_code}:{action_code}"),
        };

        set.permissions.insert(permission);
    }

    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::{GrantRow, aggregate_resolved_set};

    fn row(
        role_name: &str,
        role_level: i32,
        permission: Option<(&str, &str, Option<&str>)>,
    ) -> GrantRow {
        GrantRow {
            role_name: role_name.to_owned(),
            role_level,
            resource_code: permission.map(|(resource, _, _)| resource.to_owned()),
            action_code: permission.map(|(_, action, _)| action.to_owned()),
            permission_scope: permission.and_then(|(_, _, scope)| scope.map(str::to_owned)),
        }
    }

    #[test]
    fn aggregates_roles_permissions_and_max_level() {
        let rows = vec![
            row("COLABORADOR", 10, Some(("timerecords", "create", None))),
            row("COLABORADOR", 10, Some(("timerecords", "read", Some("own")))),
            row("RH", 50, Some(("collaborators", "read", None))),
        ];

        let set = aggregate_resolved_set(rows).unwrap_or_default();
        assert_eq!(set.roles, vec!["COLABORADOR".to_owned(), "RH".to_owned()]);
        assert_eq!(set.max_level, 50);
        assert!(set.permissions.contains("timerecords:create"));
        assert!(set.permissions.contains("timerecords:read:own"));
        assert!(set.permissions.contains("collaborators:read"));
    }

    #[test]
    fn role_without_grants_still_contributes_name_and_level() {
        let rows = vec![row("AUDITOR", 30, None)];

        let set = aggregate_resolved_set(rows).unwrap_or_default();
        assert_eq!(set.roles, vec!["AUDITOR".to_owned()]);
        assert_eq!(set.max_level, 30);
        assert!(set.permissions.is_empty());
    }

    #[test]
    fn no_rows_resolve_to_the_empty_set() {
        let set = aggregate_resolved_set(Vec::new()).unwrap_or_default();
        assert!(set.roles.is_empty());
        assert!(set.permissions.is_empty());
        assert_eq!(set.max_level, 0);
    }
}
