use chrono::{Duration, Utc};
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;

use clavis_application::{NewRoleAssignment, PermissionCatalogRepository, RoleAssignmentRepository};
use clavis_core::PrincipalId;

use crate::PostgresCatalogRepository;

use super::PostgresAssignmentRepository;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for assignment repository tests: {error}");
    }

    Some(pool)
}

async fn reset_principal(pool: &PgPool, principal_id: PrincipalId) {
    let delete = sqlx::query("DELETE FROM user_role_assignments WHERE principal_id = $1")
        .bind(principal_id.as_i64())
        .execute(pool)
        .await;
    assert!(delete.is_ok());
}

fn assignment(principal_id: PrincipalId, role_id: clavis_core::RoleId) -> NewRoleAssignment {
    NewRoleAssignment {
        principal_id,
        role_id,
        assigned_by: PrincipalId::new(1),
        expires_at: None,
    }
}

#[tokio::test]
async fn upsert_is_idempotent_and_revoke_preserves_the_row() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresAssignmentRepository::new(pool.clone());
    let principal_id = PrincipalId::new(910_001);
    reset_principal(&pool, principal_id).await;

    let role = repository
        .find_active_role_by_name("RH")
        .await
        .ok()
        .flatten();
    let Some(role) = role else {
        panic!("seeded RH role missing");
    };

    for _ in 0..2 {
        let upserted = repository.upsert_assignment(assignment(principal_id, role.id)).await;
        assert!(upserted.is_ok());
    }

    let rows = repository
        .list_assignments(principal_id)
        .await
        .unwrap_or_default();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].is_active);

    let deactivated = repository
        .deactivate_assignment(principal_id, "RH")
        .await
        .unwrap_or_default();
    assert!(deactivated);

    // Second revoke finds nothing active.
    let deactivated_again = repository
        .deactivate_assignment(principal_id, "RH")
        .await
        .unwrap_or_default();
    assert!(!deactivated_again);

    let rows = repository
        .list_assignments(principal_id)
        .await
        .unwrap_or_default();
    assert_eq!(rows.len(), 1);
    assert!(!rows[0].is_active);

    let effective = repository
        .list_effective_roles(principal_id)
        .await
        .unwrap_or_default();
    assert!(effective.is_empty());
}

#[tokio::test]
async fn expired_assignment_is_not_effective() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresAssignmentRepository::new(pool.clone());
    let principal_id = PrincipalId::new(910_002);
    reset_principal(&pool, principal_id).await;

    let Some(role) = repository
        .find_active_role_by_name("COLABORADOR")
        .await
        .ok()
        .flatten()
    else {
        panic!("seeded COLABORADOR role missing");
    };

    let upserted = repository
        .upsert_assignment(NewRoleAssignment {
            principal_id,
            role_id: role.id,
            assigned_by: PrincipalId::new(1),
            expires_at: Some(Utc::now() - Duration::seconds(1)),
        })
        .await;
    assert!(upserted.is_ok());

    let effective = repository
        .list_effective_roles(principal_id)
        .await
        .unwrap_or_default();
    assert!(effective.is_empty());

    let rows = repository
        .list_assignments(principal_id)
        .await
        .unwrap_or_default();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn catalog_flattens_effective_grants() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresAssignmentRepository::new(pool.clone());
    let catalog = PostgresCatalogRepository::new(pool.clone());
    let principal_id = PrincipalId::new(910_003);
    reset_principal(&pool, principal_id).await;

    let Some(role) = repository
        .find_active_role_by_name("COLABORADOR")
        .await
        .ok()
        .flatten()
    else {
        panic!("seeded COLABORADOR role missing");
    };

    let upserted = repository.upsert_assignment(assignment(principal_id, role.id)).await;
    assert!(upserted.is_ok());

    let set = catalog
        .load_resolved_set(principal_id)
        .await
        .unwrap_or_default();
    assert!(set.has_role("COLABORADOR"));
    assert!(set.permissions.contains("timerecords:create"));
    assert!(set.permissions.contains("timerecords:read:own"));
    assert_eq!(set.max_level, role.level);
}

#[tokio::test]
async fn unknown_role_lookup_returns_none() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresAssignmentRepository::new(pool);
    let found = repository
        .find_active_role_by_name("NAO_EXISTE")
        .await
        .unwrap_or_default();
    assert!(found.is_none());
}
