use std::collections::BTreeSet;

use async_trait::async_trait;

use identra_core::AppResult;
use identra_domain::{ProfileId, Role, RoleId, Scope, UserProfile};

/// Input payload for creating roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleInput {
    /// Role name; names are not required to be unique.
    pub name: String,
    /// Scopes granted by the role.
    pub scopes: BTreeSet<Scope>,
    /// Shields the role from the unauthorized delete path.
    pub protected: bool,
}

/// Input payload for replacing a role's scope set wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRoleScopesInput {
    /// Role to update.
    pub role_id: RoleId,
    /// Replacement scope set.
    pub scopes: BTreeSet<Scope>,
}

/// Input payload for one revocation audit record.
///
/// The store stamps the revocation time when it appends the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRevocationInput {
    /// Role that was removed.
    pub role_id: RoleId,
    /// Reason supplied by the revoking actor.
    pub reason: String,
    /// Uid of the actor that performed the revocation.
    pub revoked_by: String,
}

/// Port over the external store holding roles, profile-role associations,
/// and the revocation audit trail.
///
/// Calls are opaque latency/failure boundaries: this layer never retries,
/// batches, or caches them, and wraps driver failures as `Persistence`.
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Finds a role by its identifier.
    async fn get_role_by_id(&self, id: RoleId) -> AppResult<Option<Role>>;

    /// Lists every role.
    async fn get_all_roles(&self) -> AppResult<Vec<Role>>;

    /// Creates a role on behalf of the given profile.
    async fn create_role(&self, created_by: ProfileId, input: RoleInput) -> AppResult<Role>;

    /// Persists changed role details (scopes, activation state).
    async fn update_role_details(&self, updated_by: ProfileId, role: Role) -> AppResult<Role>;

    /// Removes a role permanently. Returns `false` when it did not exist.
    async fn delete_role(&self, id: RoleId) -> AppResult<bool>;

    /// Returns whether the scope is in the union of the uid's active roles'
    /// scopes.
    async fn check_if_user_has_permission(&self, uid: &str, scope: Scope) -> AppResult<bool>;

    /// Lists the profiles currently holding a role, suspended ones included.
    async fn get_user_profiles_by_role_id(&self, role_id: RoleId) -> AppResult<Vec<UserProfile>>;

    /// Finds a profile by its identifier.
    async fn get_user_profile_by_id(
        &self,
        id: ProfileId,
        include_suspended: bool,
    ) -> AppResult<Option<UserProfile>>;

    /// Finds a profile by its identity-provider subject.
    async fn get_user_profile_by_uid(
        &self,
        uid: &str,
        include_suspended: bool,
    ) -> AppResult<Option<UserProfile>>;

    /// Replaces a profile's role list as a compare-and-swap: the write is
    /// rejected with `Conflict` when the stored list no longer equals
    /// `expected_role_ids`, and with `NotFound` when the profile is absent.
    async fn update_user_role_ids(
        &self,
        profile_id: ProfileId,
        expected_role_ids: &[RoleId],
        updated_role_ids: &[RoleId],
    ) -> AppResult<()>;

    /// Appends one revocation record to the audit trail.
    async fn save_role_revocation(
        &self,
        user_id: ProfileId,
        input: RoleRevocationInput,
    ) -> AppResult<()>;
}
