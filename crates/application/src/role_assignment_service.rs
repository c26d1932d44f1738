use std::sync::Arc;

use identra_core::{AppError, AppResult};
use identra_domain::{ProfileId, Role, RoleId, Scope, UserProfile};

use crate::{IdentityResolver, PermissionGate, RoleRevocationInput, RoleStore};

/// Application service owning the assignment/revocation protocol.
///
/// Assignment is idempotency-protected: re-assigning a held role is a
/// `Conflict`, never a silent duplicate. Revocation requires presence and
/// appends exactly one audit record after the role-list write has landed.
#[derive(Clone)]
pub struct RoleAssignmentService {
    identity_resolver: Arc<dyn IdentityResolver>,
    permission_gate: PermissionGate,
    store: Arc<dyn RoleStore>,
}

impl RoleAssignmentService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        identity_resolver: Arc<dyn IdentityResolver>,
        permission_gate: PermissionGate,
        store: Arc<dyn RoleStore>,
    ) -> Self {
        Self {
            identity_resolver,
            permission_gate,
            store,
        }
    }

    /// Assigns a role to a profile.
    ///
    /// Returns `Conflict` without mutating anything when the profile
    /// already holds the role.
    pub async fn assign_role(&self, user_id: ProfileId, role_id: RoleId) -> AppResult<bool> {
        let uid = self.identity_resolver.get_logged_in_uid().await?;
        self.permission_gate
            .require_permission(&uid, Scope::RoleAssign)
            .await?;

        let role = self.role(role_id).await?;
        let profile = self.target_profile(user_id).await?;

        if profile.holds_role(role.id()) {
            return Err(AppError::Conflict(format!(
                "role '{}' is already assigned to profile '{user_id}'",
                role.name()
            )));
        }

        let mut updated = profile.role_ids().to_vec();
        updated.push(role.id());
        self.store
            .update_user_role_ids(profile.id(), profile.role_ids(), &updated)
            .await?;

        Ok(true)
    }

    /// Removes a role from a profile and appends one revocation record.
    ///
    /// Returns `Conflict` without mutating anything when the profile does
    /// not hold the role. When the audit write fails after the role list
    /// was updated, the removal stands and the store error is surfaced;
    /// this layer performs no rollback or retry.
    pub async fn revoke_role(
        &self,
        user_id: ProfileId,
        role_id: RoleId,
        reason: &str,
    ) -> AppResult<bool> {
        let actor = self.identity_resolver.get_logged_in_user().await?;
        self.permission_gate
            .require_permission(actor.uid(), Scope::RoleRevoke)
            .await?;

        let role = self.role(role_id).await?;
        let profile = self.target_profile(user_id).await?;

        if !profile.holds_role(role.id()) {
            return Err(AppError::Conflict(format!(
                "role '{}' is not assigned to profile '{user_id}'",
                role.name()
            )));
        }

        let updated: Vec<RoleId> = profile
            .role_ids()
            .iter()
            .copied()
            .filter(|held| *held != role.id())
            .collect();
        self.store
            .update_user_role_ids(profile.id(), profile.role_ids(), &updated)
            .await?;

        self.store
            .save_role_revocation(
                user_id,
                RoleRevocationInput {
                    role_id: role.id(),
                    reason: reason.to_owned(),
                    revoked_by: actor.uid().to_owned(),
                },
            )
            .await?;

        Ok(true)
    }

    /// Assigns a batch of roles all-or-nothing.
    ///
    /// Every role must exist, none may already be held, and the batch may
    /// not repeat a role; the whole batch is validated against one profile
    /// snapshot before a single write applies it, so a failed precondition
    /// leaves the profile untouched.
    pub async fn assign_multiple_roles(
        &self,
        user_id: ProfileId,
        role_ids: &[RoleId],
    ) -> AppResult<bool> {
        let uid = self.identity_resolver.get_logged_in_uid().await?;
        self.permission_gate
            .require_permission(&uid, Scope::RoleAssign)
            .await?;

        for (index, role_id) in role_ids.iter().enumerate() {
            if role_ids[..index].contains(role_id) {
                return Err(AppError::Validation(format!(
                    "batch contains role '{role_id}' more than once"
                )));
            }
        }

        let mut batch = Vec::with_capacity(role_ids.len());
        for role_id in role_ids {
            batch.push(self.role(*role_id).await?);
        }

        let profile = self.target_profile(user_id).await?;
        for role in &batch {
            if profile.holds_role(role.id()) {
                return Err(AppError::Conflict(format!(
                    "role '{}' is already assigned to profile '{user_id}'",
                    role.name()
                )));
            }
        }

        if batch.is_empty() {
            return Ok(true);
        }

        let mut updated = profile.role_ids().to_vec();
        updated.extend(batch.iter().map(Role::id));
        self.store
            .update_user_role_ids(profile.id(), profile.role_ids(), &updated)
            .await?;

        Ok(true)
    }

    async fn role(&self, role_id: RoleId) -> AppResult<Role> {
        self.store
            .get_role_by_id(role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))
    }

    async fn target_profile(&self, user_id: ProfileId) -> AppResult<UserProfile> {
        self.store
            .get_user_profile_by_id(user_id, false)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("profile '{user_id}' was not found")))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use identra_core::{ActorIdentity, AppError, AppResult};
    use identra_domain::{ProfileId, Role, RoleId, Scope, UserProfile};

    use crate::{IdentityResolver, PermissionGate, RoleInput, RoleRevocationInput, RoleStore};

    use super::RoleAssignmentService;

    const ACTOR_UID: &str = "alice";

    struct FakeIdentityResolver {
        actor: ActorIdentity,
    }

    #[async_trait]
    impl IdentityResolver for FakeIdentityResolver {
        async fn get_logged_in_user(&self) -> AppResult<ActorIdentity> {
            Ok(self.actor.clone())
        }

        async fn get_logged_in_uid(&self) -> AppResult<String> {
            Ok(self.actor.uid().to_owned())
        }
    }

    struct FakeRoleStore {
        roles: Mutex<Vec<Role>>,
        profiles: Mutex<Vec<UserProfile>>,
        grants: HashMap<String, Vec<Scope>>,
        revocations: Mutex<Vec<(ProfileId, RoleRevocationInput)>>,
        fail_revocation_writes: bool,
    }

    #[async_trait]
    impl RoleStore for FakeRoleStore {
        async fn get_role_by_id(&self, id: RoleId) -> AppResult<Option<Role>> {
            Ok(self
                .roles
                .lock()
                .await
                .iter()
                .find(|role| role.id() == id)
                .cloned())
        }

        async fn get_all_roles(&self) -> AppResult<Vec<Role>> {
            Ok(self.roles.lock().await.clone())
        }

        async fn create_role(&self, _created_by: ProfileId, input: RoleInput) -> AppResult<Role> {
            let role = Role::new(RoleId::new(), input.name, input.scopes, input.protected)?;
            self.roles.lock().await.push(role.clone());
            Ok(role)
        }

        async fn update_role_details(
            &self,
            _updated_by: ProfileId,
            role: Role,
        ) -> AppResult<Role> {
            Ok(role)
        }

        async fn delete_role(&self, id: RoleId) -> AppResult<bool> {
            let mut roles = self.roles.lock().await;
            let count_before = roles.len();
            roles.retain(|role| role.id() != id);
            Ok(roles.len() != count_before)
        }

        async fn check_if_user_has_permission(
            &self,
            uid: &str,
            scope: Scope,
        ) -> AppResult<bool> {
            Ok(self
                .grants
                .get(uid)
                .is_some_and(|scopes| scopes.contains(&scope)))
        }

        async fn get_user_profiles_by_role_id(
            &self,
            role_id: RoleId,
        ) -> AppResult<Vec<UserProfile>> {
            Ok(self
                .profiles
                .lock()
                .await
                .iter()
                .filter(|profile| profile.holds_role(role_id))
                .cloned()
                .collect())
        }

        async fn get_user_profile_by_id(
            &self,
            id: ProfileId,
            include_suspended: bool,
        ) -> AppResult<Option<UserProfile>> {
            Ok(self
                .profiles
                .lock()
                .await
                .iter()
                .find(|profile| profile.id() == id)
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
                .lock()
                .await
                .iter()
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
            let mut profiles = self.profiles.lock().await;
            let stored = profiles
                .iter_mut()
                .find(|profile| profile.id() == profile_id)
                .ok_or_else(|| {
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
            if self.fail_revocation_writes {
                return Err(AppError::Persistence("audit trail unavailable".to_owned()));
            }

            self.revocations.lock().await.push((user_id, input));
            Ok(())
        }
    }

    fn profile(uid: &str, role_ids: Vec<RoleId>) -> UserProfile {
        match UserProfile::new(ProfileId::new(), uid, uid, None, role_ids, false) {
            Ok(profile) => profile,
            Err(_) => panic!("profile construction failed"),
        }
    }

    fn role(name: &str) -> Role {
        match Role::new(RoleId::new(), name, BTreeSet::new(), false) {
            Ok(role) => role,
            Err(_) => panic!("role construction failed"),
        }
    }

    fn service_with(
        grants: Vec<Scope>,
        roles: Vec<Role>,
        profiles: Vec<UserProfile>,
        fail_revocation_writes: bool,
    ) -> (RoleAssignmentService, Arc<FakeRoleStore>) {
        let store = Arc::new(FakeRoleStore {
            roles: Mutex::new(roles),
            profiles: Mutex::new(profiles),
            grants: HashMap::from([(ACTOR_UID.to_owned(), grants)]),
            revocations: Mutex::new(Vec::new()),
            fail_revocation_writes,
        });
        let service = RoleAssignmentService::new(
            Arc::new(FakeIdentityResolver {
                actor: ActorIdentity::new(ACTOR_UID, "Alice", None),
            }),
            PermissionGate::new(store.clone()),
            store.clone(),
        );
        (service, store)
    }

    async fn stored_role_ids(store: &FakeRoleStore, user_id: ProfileId) -> Vec<RoleId> {
        store
            .profiles
            .lock()
            .await
            .iter()
            .find(|profile| profile.id() == user_id)
            .map(|profile| profile.role_ids().to_vec())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn assign_role_requires_assign_scope() {
        let assignable = role("support");
        let target = profile("bob", Vec::new());
        let user_id = target.id();
        let role_id = assignable.id();
        let (service, store) = service_with(Vec::new(), vec![assignable], vec![target], false);

        let result = service.assign_role(user_id, role_id).await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
        assert!(stored_role_ids(&store, user_id).await.is_empty());
    }

    #[tokio::test]
    async fn assign_role_appends_and_persists() {
        let assignable = role("support");
        let target = profile("bob", Vec::new());
        let user_id = target.id();
        let role_id = assignable.id();
        let (service, store) =
            service_with(vec![Scope::RoleAssign], vec![assignable], vec![target], false);

        let result = service.assign_role(user_id, role_id).await;

        assert!(result.is_ok_and(|assigned| assigned));
        assert_eq!(stored_role_ids(&store, user_id).await, vec![role_id]);
    }

    #[tokio::test]
    async fn assigning_a_held_role_is_a_conflict_without_mutation() {
        let assignable = role("support");
        let role_id = assignable.id();
        let target = profile("bob", vec![role_id]);
        let user_id = target.id();
        let (service, store) =
            service_with(vec![Scope::RoleAssign], vec![assignable], vec![target], false);

        let result = service.assign_role(user_id, role_id).await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(stored_role_ids(&store, user_id).await, vec![role_id]);
    }

    #[tokio::test]
    async fn assign_role_to_missing_role_is_not_found() {
        let target = profile("bob", Vec::new());
        let user_id = target.id();
        let (service, _) = service_with(vec![Scope::RoleAssign], Vec::new(), vec![target], false);

        let result = service.assign_role(user_id, RoleId::new()).await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn assign_role_to_missing_profile_is_not_found() {
        let assignable = role("support");
        let role_id = assignable.id();
        let (service, _) =
            service_with(vec![Scope::RoleAssign], vec![assignable], Vec::new(), false);

        let result = service.assign_role(ProfileId::new(), role_id).await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn revoke_role_requires_revoke_scope() {
        let held = role("support");
        let role_id = held.id();
        let target = profile("bob", vec![role_id]);
        let user_id = target.id();
        let (service, store) = service_with(Vec::new(), vec![held], vec![target], false);

        let result = service.revoke_role(user_id, role_id, "offboarding").await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
        assert_eq!(stored_role_ids(&store, user_id).await, vec![role_id]);
    }

    #[tokio::test]
    async fn revoking_an_unheld_role_is_a_conflict_without_mutation() {
        let held = role("support");
        let unheld = role("finance");
        let held_id = held.id();
        let unheld_id = unheld.id();
        let target = profile("bob", vec![held_id]);
        let user_id = target.id();
        let (service, store) =
            service_with(vec![Scope::RoleRevoke], vec![held, unheld], vec![target], false);

        let result = service.revoke_role(user_id, unheld_id, "cleanup").await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(stored_role_ids(&store, user_id).await, vec![held_id]);
        assert!(store.revocations.lock().await.is_empty());
    }

    #[tokio::test]
    async fn revoke_role_removes_and_audits_once() {
        let first = role("support");
        let second = role("finance");
        let first_id = first.id();
        let second_id = second.id();
        let target = profile("bob", vec![first_id, second_id]);
        let user_id = target.id();
        let (service, store) =
            service_with(vec![Scope::RoleRevoke], vec![first, second], vec![target], false);

        let result = service
            .revoke_role(user_id, first_id, "no longer working for us")
            .await;

        assert!(result.is_ok_and(|revoked| revoked));
        assert_eq!(stored_role_ids(&store, user_id).await, vec![second_id]);

        let revocations = store.revocations.lock().await;
        assert_eq!(revocations.len(), 1);
        assert_eq!(revocations[0].0, user_id);
        assert_eq!(revocations[0].1.role_id, first_id);
        assert_eq!(revocations[0].1.reason, "no longer working for us");
        assert_eq!(revocations[0].1.revoked_by, ACTOR_UID);
    }

    #[tokio::test]
    async fn revoke_role_preserves_order_of_remaining_roles() {
        let first = role("support");
        let middle = role("finance");
        let last = role("audit");
        let first_id = first.id();
        let middle_id = middle.id();
        let last_id = last.id();
        let target = profile("bob", vec![first_id, middle_id, last_id]);
        let user_id = target.id();
        let (service, store) = service_with(
            vec![Scope::RoleRevoke],
            vec![first, middle, last],
            vec![target],
            false,
        );

        let result = service.revoke_role(user_id, middle_id, "restructure").await;

        assert!(result.is_ok());
        assert_eq!(stored_role_ids(&store, user_id).await, vec![first_id, last_id]);
    }

    #[tokio::test]
    async fn failed_audit_write_surfaces_but_the_removal_stands() {
        let held = role("support");
        let role_id = held.id();
        let target = profile("bob", vec![role_id]);
        let user_id = target.id();
        let (service, store) = service_with(vec![Scope::RoleRevoke], vec![held], vec![target], true);

        let result = service.revoke_role(user_id, role_id, "offboarding").await;

        assert!(matches!(result, Err(AppError::Persistence(_))));
        assert!(stored_role_ids(&store, user_id).await.is_empty());
        assert!(store.revocations.lock().await.is_empty());
    }

    #[tokio::test]
    async fn assign_multiple_roles_appends_all() {
        let first = role("support");
        let second = role("finance");
        let first_id = first.id();
        let second_id = second.id();
        let target = profile("bob", Vec::new());
        let user_id = target.id();
        let (service, store) =
            service_with(vec![Scope::RoleAssign], vec![first, second], vec![target], false);

        let result = service
            .assign_multiple_roles(user_id, &[first_id, second_id])
            .await;

        assert!(result.is_ok_and(|assigned| assigned));
        assert_eq!(stored_role_ids(&store, user_id).await, vec![first_id, second_id]);
    }

    #[tokio::test]
    async fn assign_multiple_roles_is_all_or_nothing() {
        let held = role("support");
        let fresh = role("finance");
        let held_id = held.id();
        let fresh_id = fresh.id();
        let target = profile("bob", vec![held_id]);
        let user_id = target.id();
        let (service, store) =
            service_with(vec![Scope::RoleAssign], vec![held, fresh], vec![target], false);

        let result = service
            .assign_multiple_roles(user_id, &[fresh_id, held_id])
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(stored_role_ids(&store, user_id).await, vec![held_id]);
    }

    #[tokio::test]
    async fn assign_multiple_roles_rejects_duplicates_in_the_batch() {
        let assignable = role("support");
        let role_id = assignable.id();
        let target = profile("bob", Vec::new());
        let user_id = target.id();
        let (service, store) =
            service_with(vec![Scope::RoleAssign], vec![assignable], vec![target], false);

        let result = service
            .assign_multiple_roles(user_id, &[role_id, role_id])
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(stored_role_ids(&store, user_id).await.is_empty());
    }
}
