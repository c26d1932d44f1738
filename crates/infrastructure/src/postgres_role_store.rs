use std::collections::BTreeSet;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

use identra_application::{RoleInput, RoleRevocationInput, RoleStore};
use identra_core::{AppError, AppResult};
use identra_domain::{ProfileId, Role, RoleId, Scope, UserProfile};

/// PostgreSQL-backed role store.
#[derive(Clone)]
pub struct PostgresRoleStore {
    pool: PgPool,
}

impl PostgresRoleStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_profile_role_ids(&self, profile_id: Uuid) -> AppResult<Vec<RoleId>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT role_id
            FROM user_profile_roles
            WHERE profile_id = $1
            ORDER BY position
            "#,
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Persistence(format!("failed to load profile roles: {error}"))
        })?;

        Ok(ids.into_iter().map(RoleId::from_uuid).collect())
    }

    async fn hydrate_profile(&self, row: ProfileRow) -> AppResult<UserProfile> {
        let role_ids = self.load_profile_role_ids(row.id).await?;

        UserProfile::new(
            ProfileId::from_uuid(row.id),
            row.uid,
            row.display_name,
            row.email,
            role_ids,
            row.is_suspended,
        )
    }
}

#[derive(Debug, FromRow)]
struct RoleRow {
    id: Uuid,
    name: String,
    is_active: bool,
    protected: bool,
    scope: Option<String>,
}

#[derive(Debug, FromRow)]
struct ProfileRow {
    id: Uuid,
    uid: String,
    display_name: String,
    email: Option<String>,
    is_suspended: bool,
}

#[async_trait]
impl RoleStore for PostgresRoleStore {
    async fn get_role_by_id(&self, id: RoleId) -> AppResult<Option<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT roles.id, roles.name, roles.is_active, roles.protected, scopes.scope
            FROM rbac_roles AS roles
            LEFT JOIN rbac_role_scopes AS scopes
                ON scopes.role_id = roles.id
            WHERE roles.id = $1
            ORDER BY scopes.scope
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Persistence(format!("failed to load role: {error}")))?;

        Ok(aggregate_roles(rows)?.into_iter().next())
    }

    async fn get_all_roles(&self) -> AppResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT roles.id, roles.name, roles.is_active, roles.protected, scopes.scope
            FROM rbac_roles AS roles
            LEFT JOIN rbac_role_scopes AS scopes
                ON scopes.role_id = roles.id
            ORDER BY roles.name, roles.id, scopes.scope
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Persistence(format!("failed to list roles: {error}")))?;

        aggregate_roles(rows)
    }

    async fn create_role(&self, created_by: ProfileId, input: RoleInput) -> AppResult<Role> {
        let role = Role::new(RoleId::new(), input.name, input.scopes, input.protected)?;

        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Persistence(format!("failed to begin transaction: {error}"))
        })?;

        sqlx::query(
            r#"
            INSERT INTO rbac_roles (id, name, is_active, protected, created_by)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(role.id().as_uuid())
        .bind(role.name())
        .bind(role.is_active())
        .bind(role.is_protected())
        .bind(created_by.as_uuid())
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Persistence(format!("failed to persist role: {error}")))?;

        for scope in role.scopes() {
            sqlx::query(
                r#"
                INSERT INTO rbac_role_scopes (role_id, scope)
                VALUES ($1, $2)
                ON CONFLICT (role_id, scope) DO NOTHING
                "#,
            )
            .bind(role.id().as_uuid())
            .bind(scope.as_str())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Persistence(format!("failed to persist role scopes: {error}"))
            })?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Persistence(format!("failed to commit transaction: {error}"))
        })?;

        Ok(role)
    }

    async fn update_role_details(&self, _updated_by: ProfileId, role: Role) -> AppResult<Role> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Persistence(format!("failed to begin transaction: {error}"))
        })?;

        let affected = sqlx::query(
            r#"
            UPDATE rbac_roles
            SET name = $2, is_active = $3, protected = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(role.id().as_uuid())
        .bind(role.name())
        .bind(role.is_active())
        .bind(role.is_protected())
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Persistence(format!("failed to update role: {error}")))?
        .rows_affected();

        if affected == 0 {
            return Err(AppError::NotFound(format!(
                "role '{}' was not found",
                role.id()
            )));
        }

        sqlx::query("DELETE FROM rbac_role_scopes WHERE role_id = $1")
            .bind(role.id().as_uuid())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Persistence(format!("failed to clear role scopes: {error}"))
            })?;

        for scope in role.scopes() {
            sqlx::query(
                r#"
                INSERT INTO rbac_role_scopes (role_id, scope)
                VALUES ($1, $2)
                "#,
            )
            .bind(role.id().as_uuid())
            .bind(scope.as_str())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Persistence(format!("failed to persist role scopes: {error}"))
            })?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Persistence(format!("failed to commit transaction: {error}"))
        })?;

        Ok(role)
    }

    async fn delete_role(&self, id: RoleId) -> AppResult<bool> {
        let affected = sqlx::query("DELETE FROM rbac_roles WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::Persistence(format!("failed to delete role: {error}")))?
            .rows_affected();

        Ok(affected > 0)
    }

    async fn check_if_user_has_permission(&self, uid: &str, scope: Scope) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM user_profiles AS profiles
                INNER JOIN user_profile_roles AS held
                    ON held.profile_id = profiles.id
                INNER JOIN rbac_roles AS roles
                    ON roles.id = held.role_id
                INNER JOIN rbac_role_scopes AS scopes
                    ON scopes.role_id = roles.id
                WHERE profiles.uid = $1
                    AND NOT profiles.is_suspended
                    AND roles.is_active
                    AND scopes.scope = $2
            )
            "#,
        )
        .bind(uid)
        .bind(scope.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Persistence(format!("failed to check permission: {error}")))
    }

    async fn get_user_profiles_by_role_id(&self, role_id: RoleId) -> AppResult<Vec<UserProfile>> {
        let rows = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT profiles.id, profiles.uid, profiles.display_name,
                   profiles.email, profiles.is_suspended
            FROM user_profiles AS profiles
            INNER JOIN user_profile_roles AS held
                ON held.profile_id = profiles.id
            WHERE held.role_id = $1
            ORDER BY profiles.uid
            "#,
        )
        .bind(role_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Persistence(format!("failed to list role holders: {error}"))
        })?;

        let mut holders = Vec::with_capacity(rows.len());
        for row in rows {
            holders.push(self.hydrate_profile(row).await?);
        }

        Ok(holders)
    }

    async fn get_user_profile_by_id(
        &self,
        id: ProfileId,
        include_suspended: bool,
    ) -> AppResult<Option<UserProfile>> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT id, uid, display_name, email, is_suspended
            FROM user_profiles
            WHERE id = $1 AND ($2 OR NOT is_suspended)
            "#,
        )
        .bind(id.as_uuid())
        .bind(include_suspended)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Persistence(format!("failed to load profile: {error}")))?;

        match row {
            Some(row) => Ok(Some(self.hydrate_profile(row).await?)),
            None => Ok(None),
        }
    }

    async fn get_user_profile_by_uid(
        &self,
        uid: &str,
        include_suspended: bool,
    ) -> AppResult<Option<UserProfile>> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT id, uid, display_name, email, is_suspended
            FROM user_profiles
            WHERE uid = $1 AND ($2 OR NOT is_suspended)
            "#,
        )
        .bind(uid)
        .bind(include_suspended)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Persistence(format!("failed to load profile: {error}")))?;

        match row {
            Some(row) => Ok(Some(self.hydrate_profile(row).await?)),
            None => Ok(None),
        }
    }

    async fn update_user_role_ids(
        &self,
        profile_id: ProfileId,
        expected_role_ids: &[RoleId],
        updated_role_ids: &[RoleId],
    ) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Persistence(format!("failed to begin transaction: {error}"))
        })?;

        let locked = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id
            FROM user_profiles
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(profile_id.as_uuid())
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| AppError::Persistence(format!("failed to lock profile: {error}")))?;

        if locked.is_none() {
            return Err(AppError::NotFound(format!(
                "profile '{profile_id}' was not found"
            )));
        }

        let stored = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT role_id
            FROM user_profile_roles
            WHERE profile_id = $1
            ORDER BY position
            "#,
        )
        .bind(profile_id.as_uuid())
        .fetch_all(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Persistence(format!("failed to load profile roles: {error}"))
        })?;

        let expected: Vec<Uuid> = expected_role_ids.iter().map(RoleId::as_uuid).collect();
        if stored != expected {
            debug!(%profile_id, "role list changed concurrently, rejecting stale write");
            return Err(AppError::Conflict(format!(
                "role list for profile '{profile_id}' has changed"
            )));
        }

        sqlx::query("DELETE FROM user_profile_roles WHERE profile_id = $1")
            .bind(profile_id.as_uuid())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Persistence(format!("failed to clear profile roles: {error}"))
            })?;

        for (position, role_id) in (0_i32..).zip(updated_role_ids) {
            sqlx::query(
                r#"
                INSERT INTO user_profile_roles (profile_id, role_id, position)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(profile_id.as_uuid())
            .bind(role_id.as_uuid())
            .bind(position)
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Persistence(format!("failed to persist profile roles: {error}"))
            })?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Persistence(format!("failed to commit transaction: {error}"))
        })
    }

    async fn save_role_revocation(
        &self,
        user_id: ProfileId,
        input: RoleRevocationInput,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO rbac_role_revocations (user_id, role_id, reason, revoked_by)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(input.role_id.as_uuid())
        .bind(input.reason.as_str())
        .bind(input.revoked_by.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Persistence(format!("failed to append revocation record: {error}"))
        })?;

        Ok(())
    }
}

fn aggregate_roles(rows: Vec<RoleRow>) -> AppResult<Vec<Role>> {
    let mut aggregated: Vec<Role> = Vec::new();

    for row in rows {
        let scope = row
            .scope
            .as_deref()
            .map(Scope::from_str)
            .transpose()
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to decode scope for role '{}': {error}",
                    row.id
                ))
            })?;

        let continues_last = aggregated
            .last()
            .is_some_and(|last| last.id().as_uuid() == row.id);

        if continues_last {
            if let Some(scope) = scope
                && let Some(last) = aggregated.last_mut()
            {
                let mut scopes = last.scopes().clone();
                scopes.insert(scope);
                last.replace_scopes(scopes);
            }
        } else {
            let scopes: BTreeSet<Scope> = scope.into_iter().collect();
            aggregated.push(Role::restore(
                RoleId::from_uuid(row.id),
                row.name,
                scopes,
                row.is_active,
                row.protected,
            )?);
        }
    }

    Ok(aggregated)
}
