use std::collections::BTreeSet;
use std::sync::Arc;

use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use identra_application::{PermissionGate, RoleInput, RoleLifecycleService, RoleStore};
use identra_core::{ActorIdentity, AppError, AppResult};
use identra_domain::{ProfileId, RoleId, Scope};
use identra_infrastructure::{PostgresRoleStore, StaticIdentityResolver};

use crate::bootstrap_config::BootstrapConfig;

/// Carries every catalog scope; shielded from the maintenance delete path.
const ADMINISTRATOR_ROLE: &str = "administrator";

/// Disposable role used by CI suites to exercise cleanup flows.
const INTEGRATION_TEST_ROLE: &str = "integration_test";

/// Stable id for the system profile so re-runs find the same row.
const SYSTEM_PROFILE_ID: &str = "4be01974-8c2e-47d3-b1a6-55e20c5f9d38";

/// Seeds baseline roles and the system profile. Safe to re-run.
pub async fn run(pool: PgPool, config: &BootstrapConfig) -> AppResult<()> {
    let profile_id = ensure_system_profile(&pool, config).await?;

    let store: Arc<PostgresRoleStore> = Arc::new(PostgresRoleStore::new(pool));
    let resolver = Arc::new(StaticIdentityResolver::new(ActorIdentity::new(
        config.system_uid.clone(),
        config.system_display_name.clone(),
        config.system_email.clone(),
    )));
    let lifecycle = RoleLifecycleService::new(
        resolver,
        PermissionGate::new(store.clone()),
        store.clone(),
    );

    let administrator_id = ensure_role(
        &lifecycle,
        store.as_ref(),
        ADMINISTRATOR_ROLE,
        Scope::all().iter().copied().collect(),
        true,
    )
    .await?;
    ensure_role(
        &lifecycle,
        store.as_ref(),
        INTEGRATION_TEST_ROLE,
        BTreeSet::new(),
        false,
    )
    .await?;

    ensure_administrator_assignment(store.as_ref(), profile_id, administrator_id).await
}

/// Upserts the profile row the seeded roles are created under.
///
/// Profile provisioning belongs to the profile store; the bootstrap writes
/// the one row it needs directly, keyed by uid so re-runs converge.
async fn ensure_system_profile(
    pool: &PgPool,
    config: &BootstrapConfig,
) -> AppResult<ProfileId> {
    let seed_id = parse_uuid_const(SYSTEM_PROFILE_ID, "SYSTEM_PROFILE_ID")?;

    sqlx::query(
        r#"
        INSERT INTO user_profiles (id, uid, display_name, email)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (uid) DO UPDATE
            SET display_name = EXCLUDED.display_name,
                email = EXCLUDED.email
        "#,
    )
    .bind(seed_id)
    .bind(config.system_uid.as_str())
    .bind(config.system_display_name.as_str())
    .bind(config.system_email.as_deref())
    .execute(pool)
    .await
    .map_err(|error| {
        AppError::Persistence(format!("failed to upsert system profile: {error}"))
    })?;

    // The conflict path keeps the original id; read back whichever row won.
    let actual_id = sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT id
        FROM user_profiles
        WHERE uid = $1
        "#,
    )
    .bind(config.system_uid.as_str())
    .fetch_one(pool)
    .await
    .map_err(|error| {
        AppError::Persistence(format!("failed to resolve system profile: {error}"))
    })?;

    Ok(ProfileId::from_uuid(actual_id))
}

async fn ensure_role(
    lifecycle: &RoleLifecycleService,
    store: &dyn RoleStore,
    name: &str,
    scopes: BTreeSet<Scope>,
    protected: bool,
) -> AppResult<RoleId> {
    let existing = store
        .get_all_roles()
        .await?
        .into_iter()
        .find(|role| role.name() == name);

    if let Some(role) = existing {
        info!(role = name, "role already present, skipping");
        return Ok(role.id());
    }

    let created = lifecycle
        .create_unauthorized_role(RoleInput {
            name: name.to_owned(),
            scopes,
            protected,
        })
        .await?;
    info!(role = name, scopes = created.scopes.len(), "seeded role");

    Ok(created.id)
}

/// Attaches the administrator role to the system profile.
///
/// Runs against the store primitive rather than the assignment service:
/// before the first run no actor holds `role.assign`, so the service gate
/// would refuse the very grant that breaks that cycle.
async fn ensure_administrator_assignment(
    store: &dyn RoleStore,
    profile_id: ProfileId,
    administrator_id: RoleId,
) -> AppResult<()> {
    let profile = store
        .get_user_profile_by_id(profile_id, true)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("profile '{profile_id}' was not found")))?;

    if profile.holds_role(administrator_id) {
        info!("system profile already holds the administrator role");
        return Ok(());
    }

    let mut updated = profile.role_ids().to_vec();
    updated.push(administrator_id);
    store
        .update_user_role_ids(profile_id, profile.role_ids(), &updated)
        .await?;
    info!("assigned the administrator role to the system profile");

    Ok(())
}

fn parse_uuid_const(value: &str, name: &str) -> AppResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|error| AppError::Internal(format!("invalid {name} constant: {error}")))
}
