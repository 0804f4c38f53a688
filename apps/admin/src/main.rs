//! Clavis operations CLI.
//!
//! Wires the authorization engine against the shared PostgreSQL store and
//! optional Redis cache tier, then drives one administrative operation:
//! permission checks, role grants and revocations, assignment listings,
//! cache purges, or the one-time legacy profile migration.

#![forbid(unsafe_code)]

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use clavis_application::{
    AssignmentService, AuditTrail, AuthorizationService, DEFAULT_CACHE_TTL, LegacyProfile,
    PermissionSetCache,
};
use clavis_core::{AppError, AppResult, PrincipalId};
use clavis_domain::AccessContext;
use clavis_infrastructure::{
    PostgresAssignmentRepository, PostgresAuditRepository, PostgresCatalogRepository,
    RedisPermissionSetCache,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Operations CLI for the Clavis authorization engine.
#[derive(Debug, Parser)]
#[command(name = "clavis-admin", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Decide whether a principal holds a permission.
    Check {
        /// Principal being checked.
        principal: i64,
        /// Requested `resource:action` permission.
        permission: String,
        /// Owner of the targeted resource, enabling ownership-scoped grants.
        #[arg(long)]
        owner: Option<i64>,
    },
    /// Grant a role to a principal.
    Grant {
        /// Principal receiving the role.
        principal: i64,
        /// Role name, e.g. RH.
        role: String,
        /// Principal performing the grant.
        #[arg(long)]
        granted_by: i64,
        /// Optional RFC3339 expiry for a temporary grant.
        #[arg(long)]
        expires_at: Option<String>,
    },
    /// Revoke a role from a principal.
    Revoke {
        /// Principal losing the role.
        principal: i64,
        /// Role name to revoke.
        role: String,
        /// Principal performing the revocation.
        #[arg(long)]
        revoked_by: i64,
    },
    /// List a principal's effective roles.
    EffectiveRoles {
        /// Principal to inspect.
        principal: i64,
    },
    /// List every assignment row for a principal, revoked ones included.
    Assignments {
        /// Principal to inspect.
        principal: i64,
    },
    /// Purge a principal's cached permission set.
    Invalidate {
        /// Principal whose cache entry is purged.
        principal: i64,
        /// Principal requesting the purge.
        #[arg(long)]
        requested_by: i64,
    },
    /// Migrate principals from a legacy single-profile export.
    MigrateLegacy {
        /// JSON file holding an array of { "principal_id": .., "profile": ".." }.
        file: PathBuf,
        /// Principal recorded as the actor of the migration grants.
        #[arg(long)]
        migrated_by: i64,
    },
}

#[derive(Debug, Clone)]
struct AdminConfig {
    database_url: String,
    redis_url: Option<String>,
    cache_ttl: Duration,
    sweep_interval: Duration,
}

impl AdminConfig {
    fn load() -> Result<Self, AppError> {
        let database_url = required_env("DATABASE_URL")?;
        let redis_url = env::var("REDIS_URL").ok();
        let cache_ttl = optional_env_seconds("CLAVIS_CACHE_TTL_SECONDS", DEFAULT_CACHE_TTL)?;
        let sweep_interval =
            optional_env_seconds("CLAVIS_SWEEP_INTERVAL_SECONDS", Duration::from_secs(60))?;

        Ok(Self {
            database_url,
            redis_url,
            cache_ttl,
            sweep_interval,
        })
    }
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| {
        AppError::Validation(format!("missing required environment variable {name}"))
    })
}

fn optional_env_seconds(name: &str, default: Duration) -> Result<Duration, AppError> {
    match env::var(name) {
        Ok(value) => value
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|error| AppError::Validation(format!("invalid {name}: {error}"))),
        Err(_) => Ok(default),
    }
}

struct Engine {
    authorization: AuthorizationService,
    assignments: AssignmentService,
}

async fn connect_and_migrate(database_url: &str) -> Result<PgPool, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(|error| {
            AppError::StoreUnavailable(format!("failed to connect to database: {error}"))
        })?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    Ok(pool)
}

fn build_redis_client(redis_url: &str) -> Result<redis::Client, AppError> {
    redis::Client::open(redis_url)
        .map_err(|error| AppError::Validation(format!("invalid REDIS_URL: {error}")))
}

async fn build_engine(config: &AdminConfig) -> AppResult<Engine> {
    let pool = connect_and_migrate(config.database_url.as_str()).await?;

    let cache = match &config.redis_url {
        Some(redis_url) => {
            let client = build_redis_client(redis_url.as_str())?;
            Arc::new(PermissionSetCache::with_distributed(
                config.cache_ttl,
                Arc::new(RedisPermissionSetCache::new(client, "clavis:authz")),
            ))
        }
        None => Arc::new(PermissionSetCache::new(config.cache_ttl)),
    };
    let _sweeper = Arc::clone(&cache).spawn_sweeper(config.sweep_interval);

    let audit = AuditTrail::new(Arc::new(PostgresAuditRepository::new(pool.clone())));
    let authorization = AuthorizationService::new(
        Arc::new(PostgresCatalogRepository::new(pool.clone())),
        cache.clone(),
        audit.clone(),
    );
    let assignments = AssignmentService::new(
        Arc::new(PostgresAssignmentRepository::new(pool)),
        cache,
        audit,
    );

    Ok(Engine {
        authorization,
        assignments,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn parse_expiry(value: Option<String>) -> Result<Option<DateTime<Utc>>, AppError> {
    value
        .map(|raw| {
            DateTime::parse_from_rfc3339(raw.as_str())
                .map(|parsed| parsed.with_timezone(&Utc))
                .map_err(|error| {
                    AppError::Validation(format!("invalid --expires-at value '{raw}': {error}"))
                })
        })
        .transpose()
}

async fn run_command(engine: &Engine, command: Command) -> AppResult<()> {
    match command {
        Command::Check {
            principal,
            permission,
            owner,
        } => {
            let principal_id = PrincipalId::new(principal);
            let context = match owner {
                Some(owner) => AccessContext::for_owner(principal_id, PrincipalId::new(owner)),
                None => AccessContext::default(),
            };

            let granted = engine
                .authorization
                .check(principal_id, permission.as_str(), &context)
                .await;
            println!(
                "{}: {permission} for principal {principal}",
                if granted { "GRANTED" } else { "DENIED" }
            );

            if let Ok((set, _)) = engine.authorization.resolved_set(principal_id).await {
                println!("roles: {}", set.roles.join(", "));
            }
        }
        Command::Grant {
            principal,
            role,
            granted_by,
            expires_at,
        } => {
            let expires_at = parse_expiry(expires_at)?;
            engine
                .assignments
                .grant(
                    PrincipalId::new(principal),
                    role.as_str(),
                    PrincipalId::new(granted_by),
                    expires_at,
                )
                .await?;
            println!("granted role '{role}' to principal {principal}");
        }
        Command::Revoke {
            principal,
            role,
            revoked_by,
        } => {
            engine
                .assignments
                .revoke(
                    PrincipalId::new(principal),
                    role.as_str(),
                    PrincipalId::new(revoked_by),
                )
                .await?;
            println!("revoked role '{role}' from principal {principal}");
        }
        Command::EffectiveRoles { principal } => {
            let roles = engine
                .assignments
                .list_effective_roles(PrincipalId::new(principal))
                .await?;
            if roles.is_empty() {
                println!("principal {principal} has no effective roles");
            }
            for role in roles {
                println!("{} (level {}, system: {})", role.name, role.level, role.is_system);
            }
        }
        Command::Assignments { principal } => {
            let assignments = engine
                .assignments
                .list_assignments(PrincipalId::new(principal))
                .await?;
            if assignments.is_empty() {
                println!("principal {principal} has no assignment rows");
            }
            for assignment in assignments {
                println!(
                    "{} assigned_at={} expires_at={} active={}",
                    assignment.role_name,
                    assignment.assigned_at.to_rfc3339(),
                    assignment
                        .expires_at
                        .map_or_else(|| "never".to_owned(), |value| value.to_rfc3339()),
                    assignment.is_active
                );
            }
        }
        Command::Invalidate {
            principal,
            requested_by,
        } => {
            engine
                .assignments
                .invalidate_cache(PrincipalId::new(principal), PrincipalId::new(requested_by))
                .await;
            println!("invalidated cached permission set for principal {principal}");
        }
        Command::MigrateLegacy { file, migrated_by } => {
            let raw = std::fs::read_to_string(&file).map_err(|error| {
                AppError::Validation(format!(
                    "failed to read legacy profile file '{}': {error}",
                    file.display()
                ))
            })?;
            let profiles: Vec<LegacyProfile> =
                serde_json::from_str(raw.as_str()).map_err(|error| {
                    AppError::Validation(format!(
                        "invalid legacy profile file '{}': {error}",
                        file.display()
                    ))
                })?;

            let report = engine
                .assignments
                .migrate_legacy_profiles(profiles, PrincipalId::new(migrated_by))
                .await;

            println!(
                "migrated {} principal(s), {} failure(s)",
                report.migrated,
                report.failures.len()
            );
            for failure in report.failures {
                println!("  {}: {}", failure.principal_id, failure.reason);
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = AdminConfig::load()?;
    let engine = build_engine(&config).await?;

    info!(
        cache_ttl_seconds = config.cache_ttl.as_secs(),
        distributed_cache = config.redis_url.is_some(),
        "clavis-admin started"
    );

    run_command(&engine, cli.command).await
}
