use std::collections::BTreeSet;
use std::sync::Arc;

use identra_core::{ActorIdentity, AppError, AppResult, NonEmptyString};
use identra_domain::{Role, RoleId, Scope, UserProfile};

use crate::{
    IdentityResolver, PermissionGate, RoleInput, RoleOutput, RoleStore, UpdateRoleScopesInput,
};

/// Application service owning the role lifecycle: creation, listing, scope
/// changes, activation state, and deletion.
///
/// Every mutating operation authorizes the actor through the permission
/// gate first, except the explicitly unauthorized variants. Mutations are
/// attempted only after all required reads (actor, role, profile) succeed.
#[derive(Clone)]
pub struct RoleLifecycleService {
    identity_resolver: Arc<dyn IdentityResolver>,
    permission_gate: PermissionGate,
    store: Arc<dyn RoleStore>,
}

impl RoleLifecycleService {
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

    /// Creates a role on behalf of the authorized actor.
    pub async fn create_role(&self, input: RoleInput) -> AppResult<RoleOutput> {
        let actor = self.identity_resolver.get_logged_in_user().await?;
        self.permission_gate
            .require_permission(actor.uid(), Scope::RoleCreate)
            .await?;

        self.create_role_for_actor(&actor, input).await
    }

    /// Creates a role without a permission check.
    ///
    /// Bootstrap/administrative path: still requires a resolvable actor
    /// with a profile on file.
    pub async fn create_unauthorized_role(&self, input: RoleInput) -> AppResult<RoleOutput> {
        let actor = self.identity_resolver.get_logged_in_user().await?;
        self.create_role_for_actor(&actor, input).await
    }

    /// Returns every role with its current holders attached.
    pub async fn get_all_roles(&self) -> AppResult<Vec<RoleOutput>> {
        let uid = self.identity_resolver.get_logged_in_uid().await?;
        self.permission_gate
            .require_permission(&uid, Scope::RoleRead)
            .await?;

        let roles = self.store.get_all_roles().await?;
        self.outputs_with_users(roles).await
    }

    /// Returns the roles whose name matches `name` exactly, with holders.
    pub async fn find_role_by_name(&self, name: &str) -> AppResult<Vec<RoleOutput>> {
        let uid = self.identity_resolver.get_logged_in_uid().await?;
        self.permission_gate
            .require_permission(&uid, Scope::RoleRead)
            .await?;

        let roles = self
            .store
            .get_all_roles()
            .await?
            .into_iter()
            .filter(|role| role.name() == name)
            .collect();
        self.outputs_with_users(roles).await
    }

    /// Adds scopes to a role (set union with its current scopes).
    pub async fn add_permissions_to_role(
        &self,
        role_id: RoleId,
        scopes: BTreeSet<Scope>,
    ) -> AppResult<RoleOutput> {
        self.apply_scope_change(role_id, ScopeChange::Grant(scopes))
            .await
    }

    /// Removes scopes from a role (set difference against its current
    /// scopes).
    pub async fn revoke_role_permission(
        &self,
        role_id: RoleId,
        scopes: BTreeSet<Scope>,
    ) -> AppResult<RoleOutput> {
        self.apply_scope_change(role_id, ScopeChange::Remove(scopes))
            .await
    }

    /// Replaces a role's scope set wholesale.
    pub async fn update_role_scopes(&self, input: UpdateRoleScopesInput) -> AppResult<RoleOutput> {
        self.apply_scope_change(input.role_id, ScopeChange::Replace(input.scopes))
            .await
    }

    /// Marks a role active so it grants its scopes again.
    pub async fn activate_role(&self, role_id: RoleId) -> AppResult<RoleOutput> {
        self.set_role_activation(role_id, true).await
    }

    /// Marks a role inactive; it stops granting scopes but keeps its
    /// assignments.
    pub async fn deactivate_role(&self, role_id: RoleId) -> AppResult<RoleOutput> {
        self.set_role_activation(role_id, false).await
    }

    /// Deletes a role permanently. Returns `false` when it did not exist.
    pub async fn delete_role(&self, role_id: RoleId) -> AppResult<bool> {
        let uid = self.identity_resolver.get_logged_in_uid().await?;
        self.permission_gate
            .require_permission(&uid, Scope::RoleDelete)
            .await?;

        self.store.delete_role(role_id).await
    }

    /// Deletes a role without a permission check, refusing protected roles.
    ///
    /// Maintenance/CI cleanup path: the compensating guard is the role's
    /// `protected` flag, and refusal surfaces as `Conflict`, never as a
    /// generic `NotFound`. Must not be reachable from end-user surfaces.
    pub async fn unauthorized_delete_role(&self, role_id: RoleId) -> AppResult<bool> {
        let role = self
            .store
            .get_role_by_id(role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))?;

        if role.is_protected() {
            return Err(AppError::Conflict(format!(
                "role '{}' is protected and cannot be deleted through the maintenance path",
                role.name()
            )));
        }

        self.store.delete_role(role_id).await
    }

    async fn create_role_for_actor(
        &self,
        actor: &ActorIdentity,
        input: RoleInput,
    ) -> AppResult<RoleOutput> {
        NonEmptyString::new(input.name.as_str())?;

        let profile = self.actor_profile(actor.uid()).await?;
        let role = self.store.create_role(profile.id(), input).await?;

        // A brand-new role has no holders; the output carries no users.
        Ok(RoleOutput::project(&role))
    }

    async fn apply_scope_change(
        &self,
        role_id: RoleId,
        change: ScopeChange,
    ) -> AppResult<RoleOutput> {
        let actor = self.identity_resolver.get_logged_in_user().await?;
        self.permission_gate
            .require_permission(actor.uid(), Scope::RoleUpdate)
            .await?;

        let mut role = self
            .store
            .get_role_by_id(role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))?;
        let profile = self.actor_profile(actor.uid()).await?;

        let replacement = match change {
            ScopeChange::Grant(added) => role.scopes().union(&added).copied().collect(),
            ScopeChange::Remove(removed) => role.scopes().difference(&removed).copied().collect(),
            ScopeChange::Replace(scopes) => scopes,
        };
        role.replace_scopes(replacement);

        let updated = self.store.update_role_details(profile.id(), role).await?;
        Ok(RoleOutput::project(&updated))
    }

    async fn set_role_activation(&self, role_id: RoleId, is_active: bool) -> AppResult<RoleOutput> {
        let actor = self.identity_resolver.get_logged_in_user().await?;
        self.permission_gate
            .require_permission(actor.uid(), Scope::RoleUpdate)
            .await?;

        let mut role = self
            .store
            .get_role_by_id(role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))?;
        let profile = self.actor_profile(actor.uid()).await?;

        role.set_active(is_active);

        let updated = self.store.update_role_details(profile.id(), role).await?;
        Ok(RoleOutput::project(&updated))
    }

    async fn outputs_with_users(&self, roles: Vec<Role>) -> AppResult<Vec<RoleOutput>> {
        let mut outputs = Vec::with_capacity(roles.len());
        for role in roles {
            let users = self.store.get_user_profiles_by_role_id(role.id()).await?;
            outputs.push(RoleOutput::project(&role).with_users(users));
        }

        Ok(outputs)
    }

    async fn actor_profile(&self, uid: &str) -> AppResult<UserProfile> {
        self.store
            .get_user_profile_by_uid(uid, false)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("no profile found for actor '{uid}'")))
    }
}

enum ScopeChange {
    Grant(BTreeSet<Scope>),
    Remove(BTreeSet<Scope>),
    Replace(BTreeSet<Scope>),
}
