use std::collections::BTreeSet;

use identra_domain::{Permission, Role, RoleId, Scope, UserProfile, permission_catalog};

/// Read-model returned to callers: one role overlaid onto the full
/// permission catalog, optionally with the profiles holding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleOutput {
    /// Role identifier.
    pub id: RoleId,
    /// Role name.
    pub name: String,
    /// Scopes granted by the role.
    pub scopes: BTreeSet<Scope>,
    /// The complete catalog with `allowed` overlaid for this role.
    pub permissions: Vec<Permission>,
    /// Profiles currently holding the role; empty for operations that do
    /// not need it.
    pub users: Vec<UserProfile>,
}

impl RoleOutput {
    /// Projects a role onto the catalog: every entry keeps catalog order
    /// and `allowed` is set iff the role grants that scope.
    #[must_use]
    pub fn project(role: &Role) -> Self {
        let permissions = permission_catalog()
            .into_iter()
            .map(|mut entry| {
                entry.allowed = role.scopes().contains(&entry.scope);
                entry
            })
            .collect();

        Self {
            id: role.id(),
            name: role.name().to_owned(),
            scopes: role.scopes().clone(),
            permissions,
            users: Vec::new(),
        }
    }

    /// Attaches the profiles currently holding the role.
    #[must_use]
    pub fn with_users(mut self, users: Vec<UserProfile>) -> Self {
        self.users = users;
        self
    }
}
