use std::collections::BTreeSet;

use identra_core::{AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Scope;

/// Unique identifier for a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleId(Uuid);

impl RoleId {
    /// Creates a new random role identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a role identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RoleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RoleId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// A named, persisted bundle of scopes that can be attached to users.
///
/// Lifecycle: created active (unless restored otherwise), toggled between
/// active and inactive, removed permanently by deletion. Scope membership in
/// the catalog is guaranteed by the [`Scope`] type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    id: RoleId,
    name: NonEmptyString,
    scopes: BTreeSet<Scope>,
    is_active: bool,
    protected: bool,
}

impl Role {
    /// Creates a new active role with a validated name.
    pub fn new(
        id: RoleId,
        name: impl Into<String>,
        scopes: BTreeSet<Scope>,
        protected: bool,
    ) -> AppResult<Self> {
        Ok(Self {
            id,
            name: NonEmptyString::new(name)?,
            scopes,
            is_active: true,
            protected,
        })
    }

    /// Rehydrates a role from stored state.
    pub fn restore(
        id: RoleId,
        name: impl Into<String>,
        scopes: BTreeSet<Scope>,
        is_active: bool,
        protected: bool,
    ) -> AppResult<Self> {
        Ok(Self {
            id,
            name: NonEmptyString::new(name)?,
            scopes,
            is_active,
            protected,
        })
    }

    /// Returns the role identifier.
    #[must_use]
    pub fn id(&self) -> RoleId {
        self.id
    }

    /// Returns the role name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the scopes granted by this role.
    #[must_use]
    pub fn scopes(&self) -> &BTreeSet<Scope> {
        &self.scopes
    }

    /// Returns whether the role currently grants its scopes.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Returns whether the role is shielded from the unauthorized delete
    /// path.
    #[must_use]
    pub fn is_protected(&self) -> bool {
        self.protected
    }

    /// Replaces the scope set wholesale.
    pub fn replace_scopes(&mut self, scopes: BTreeSet<Scope>) {
        self.scopes = scopes;
    }

    /// Sets the activation state.
    pub fn set_active(&mut self, is_active: bool) {
        self.is_active = is_active;
    }
}
