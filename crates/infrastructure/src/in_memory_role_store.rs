use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use identra_application::{RoleInput, RoleRevocationInput, RoleStore};
use identra_core::{AppError, AppResult};
use identra_domain::{ProfileId, Role, RoleId, RoleRevocation, Scope, UserProfile};

/// In-memory role store implementation.
///
/// Backs local development and integration tests; the compare-and-swap on
/// role lists and the scope-union permission check behave exactly like the
/// PostgreSQL adapter.
#[derive(Debug, Default)]
pub struct InMemoryRoleStore {
    roles: RwLock<HashMap<RoleId, Role>>,
    profiles: RwLock<HashMap<ProfileId, UserProfile>>,
    revocations: RwLock<Vec<RoleRevocation>>,
}

impl InMemoryRoleStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            roles: RwLock::new(HashMap::new()),
            profiles: RwLock::new(HashMap::new()),
            revocations: RwLock::new(Vec::new()),
        }
    }

    /// Inserts or replaces a profile record.
    ///
    /// Profile provisioning is owned by the external profile store; this
    /// helper exists so fixtures and the bootstrap wiring can seed state.
    pub async fn upsert_user_profile(&self, profile: UserProfile) {
        self.profiles.write().await.insert(profile.id(), profile);
    }

    /// Returns a copy of the revocation audit trail.
    pub async fn role_revocations(&self) -> Vec<RoleRevocation> {
        self.revocations.read().await.clone()
    }
}

#[async_trait]
impl RoleStore for InMemoryRoleStore {
    async fn get_role_by_id(&self, id: RoleId) -> AppResult<Option<Role>> {
        Ok(self.roles.read().await.get(&id).cloned())
    }

    async fn get_all_roles(&self) -> AppResult<Vec<Role>> {
        let roles = self.roles.read().await;

        let mut listed: Vec<Role> = roles.values().cloned().collect();
        listed.sort_by(|left, right| left.name().cmp(right.name()));

        Ok(listed)
    }

    async fn create_role(&self, _created_by: ProfileId, input: RoleInput) -> AppResult<Role> {
        let role = Role::new(RoleId::new(), input.name, input.scopes, input.protected)?;
        self.roles.write().await.insert(role.id(), role.clone());

        Ok(role)
    }

    async fn update_role_details(&self, _updated_by: ProfileId, role: Role) -> AppResult<Role> {
        let mut roles = self.roles.write().await;

        if !roles.contains_key(&role.id()) {
            return Err(AppError::NotFound(format!(
                "role '{}' was not found",
                role.id()
            )));
        }

        roles.insert(role.id(), role.clone());
        Ok(role)
    }

    async fn delete_role(&self, id: RoleId) -> AppResult<bool> {
        Ok(self.roles.write().await.remove(&id).is_some())
    }

    async fn check_if_user_has_permission(&self, uid: &str, scope: Scope) -> AppResult<bool> {
        let profiles = self.profiles.read().await;
        let Some(profile) = profiles
            .values()
            .find(|profile| profile.uid() == uid && !profile.is_suspended())
        else {
            return Ok(false);
        };

        let roles = self.roles.read().await;
        let granted = profile.role_ids().iter().any(|role_id| {
            roles
                .get(role_id)
                .is_some_and(|role| role.is_active() && role.scopes().contains(&scope))
        });

        Ok(granted)
    }

    async fn get_user_profiles_by_role_id(&self, role_id: RoleId) -> AppResult<Vec<UserProfile>> {
        let profiles = self.profiles.read().await;

        let mut holders: Vec<UserProfile> = profiles
            .values()
            .filter(|profile| profile.holds_role(role_id))
            .cloned()
            .collect();
        holders.sort_by(|left, right| left.uid().cmp(right.uid()));

        Ok(holders)
    }

    async fn get_user_profile_by_id(
        &self,
        id: ProfileId,
        include_suspended: bool,
    ) -> AppResult<Option<UserProfile>> {
        Ok(self
            .profiles
            .read()
            .await
            .get(&id)
            .filter(|profile| include_suspended || !profile.is_suspended())
            .cloned())
    }

    async fn get_user_profile_by_uid(
        &self,
        uid: &str,
        include_suspended: bool,
    ) -> AppResult<Option<UserProfile>> {
        Ok(self
            .profiles
            .read()
            .await
            .values()
            .find(|profile| profile.uid() == uid)
            .filter(|profile| include_suspended || !profile.is_suspended())
            .cloned())
    }

    async fn update_user_role_ids(
        &self,
        profile_id: ProfileId,
        expected_role_ids: &[RoleId],
        updated_role_ids: &[RoleId],
    ) -> AppResult<()> {
        let mut profiles = self.profiles.write().await;
        let stored = profiles.get_mut(&profile_id).ok_or_else(|| {
            AppError::NotFound(format!("profile '{profile_id}' was not found"))
        })?;

        if stored.role_ids() != expected_role_ids {
            return Err(AppError::Conflict(format!(
                "role list for profile '{profile_id}' has changed"
            )));
        }

        *stored = UserProfile::new(
            stored.id(),
            stored.uid(),
            stored.display_name(),
            stored.email().map(str::to_owned),
            updated_role_ids.to_vec(),
            stored.is_suspended(),
        )?;

        Ok(())
    }

    async fn save_role_revocation(
        &self,
        user_id: ProfileId,
        input: RoleRevocationInput,
    ) -> AppResult<()> {
        self.revocations.write().await.push(RoleRevocation::new(
            user_id,
            input.role_id,
            input.reason,
            input.revoked_by,
            Utc::now(),
        ));

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use identra_application::{RoleInput, RoleRevocationInput, RoleStore};
    use identra_core::AppError;
    use identra_domain::{ProfileId, RoleId, Scope, UserProfile};

    use super::InMemoryRoleStore;

    fn profile(uid: &str, role_ids: Vec<RoleId>, is_suspended: bool) -> UserProfile {
        match UserProfile::new(ProfileId::new(), uid, uid, None, role_ids, is_suspended) {
            Ok(profile) => profile,
            Err(_) => panic!("profile construction failed"),
        }
    }

    async fn created_role(store: &InMemoryRoleStore, name: &str, scopes: BTreeSet<Scope>) -> RoleId {
        let result = store
            .create_role(
                ProfileId::new(),
                RoleInput {
                    name: name.to_owned(),
                    scopes,
                    protected: false,
                },
            )
            .await;
        match result {
            Ok(role) => role.id(),
            Err(_) => panic!("role creation failed"),
        }
    }

    #[tokio::test]
    async fn roles_are_listed_sorted_by_name() {
        let store = InMemoryRoleStore::new();
        created_role(&store, "support", BTreeSet::new()).await;
        created_role(&store, "audit", BTreeSet::new()).await;

        let listed = store.get_all_roles().await;

        let Ok(listed) = listed else {
            panic!("get_all_roles failed");
        };
        let names: Vec<&str> = listed.iter().map(|role| role.name()).collect();
        assert_eq!(names, vec!["audit", "support"]);
    }

    #[tokio::test]
    async fn permission_check_unions_only_active_roles() {
        let store = InMemoryRoleStore::new();
        let active = created_role(&store, "reader", BTreeSet::from([Scope::RoleRead])).await;
        let dormant = created_role(&store, "writer", BTreeSet::from([Scope::RoleUpdate])).await;

        let Ok(Some(mut dormant_role)) = store.get_role_by_id(dormant).await else {
            panic!("role lookup failed");
        };
        dormant_role.set_active(false);
        let updated = store.update_role_details(ProfileId::new(), dormant_role).await;
        assert!(updated.is_ok());

        store
            .upsert_user_profile(profile("dana", vec![active, dormant], false))
            .await;

        let read = store.check_if_user_has_permission("dana", Scope::RoleRead).await;
        assert!(read.is_ok_and(|granted| granted));

        let update = store
            .check_if_user_has_permission("dana", Scope::RoleUpdate)
            .await;
        assert!(update.is_ok_and(|granted| !granted));
    }

    #[tokio::test]
    async fn suspended_profiles_hold_no_permissions() {
        let store = InMemoryRoleStore::new();
        let reader = created_role(&store, "reader", BTreeSet::from([Scope::RoleRead])).await;
        store
            .upsert_user_profile(profile("dana", vec![reader], true))
            .await;

        let result = store.check_if_user_has_permission("dana", Scope::RoleRead).await;
        assert!(result.is_ok_and(|granted| !granted));
    }

    #[tokio::test]
    async fn stale_role_list_update_is_rejected() {
        let store = InMemoryRoleStore::new();
        let first = created_role(&store, "first", BTreeSet::new()).await;
        let second = created_role(&store, "second", BTreeSet::new()).await;
        let stored = profile("dana", vec![first], false);
        let profile_id = stored.id();
        store.upsert_user_profile(stored).await;

        // Stale expectation: the caller read an empty list.
        let result = store
            .update_user_role_ids(profile_id, &[], &[second])
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        let current = store.get_user_profile_by_id(profile_id, true).await;
        assert!(current.is_ok_and(|profile| {
            profile.is_some_and(|profile| profile.role_ids() == [first])
        }));
    }

    #[tokio::test]
    async fn matching_role_list_update_is_applied() {
        let store = InMemoryRoleStore::new();
        let first = created_role(&store, "first", BTreeSet::new()).await;
        let second = created_role(&store, "second", BTreeSet::new()).await;
        let stored = profile("dana", vec![first], false);
        let profile_id = stored.id();
        store.upsert_user_profile(stored).await;

        let result = store
            .update_user_role_ids(profile_id, &[first], &[first, second])
            .await;
        assert!(result.is_ok());

        let current = store.get_user_profile_by_id(profile_id, true).await;
        assert!(current.is_ok_and(|profile| {
            profile.is_some_and(|profile| profile.role_ids() == [first, second])
        }));
    }

    #[tokio::test]
    async fn revocations_accumulate_in_order() {
        let store = InMemoryRoleStore::new();
        let role_id = created_role(&store, "support", BTreeSet::new()).await;
        let user_id = ProfileId::new();

        let saved = store
            .save_role_revocation(
                user_id,
                RoleRevocationInput {
                    role_id,
                    reason: "offboarding".to_owned(),
                    revoked_by: "alice".to_owned(),
                },
            )
            .await;
        assert!(saved.is_ok());

        let trail = store.role_revocations().await;
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].user_id(), user_id);
        assert_eq!(trail[0].reason(), "offboarding");
        assert_eq!(trail[0].revoked_by(), "alice");
    }
}
