use identra_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::RoleId;

/// Unique identifier for a user profile record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProfileId(Uuid);

impl ProfileId {
    /// Creates a new random profile identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a profile identifier from an existing UUID value.
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

impl Default for ProfileId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProfileId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Projection of a user profile owned by the external profile store.
///
/// This subsystem reads the whole record but mutates only `role_ids`, and
/// only through the assignment/revocation protocol. `role_ids` is an
/// ordered sequence with set semantics: a role appears at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    id: ProfileId,
    uid: String,
    display_name: String,
    email: Option<String>,
    role_ids: Vec<RoleId>,
    is_suspended: bool,
}

impl UserProfile {
    /// Creates a profile projection, rejecting duplicate role ids.
    pub fn new(
        id: ProfileId,
        uid: impl Into<String>,
        display_name: impl Into<String>,
        email: Option<String>,
        role_ids: Vec<RoleId>,
        is_suspended: bool,
    ) -> AppResult<Self> {
        for (index, role_id) in role_ids.iter().enumerate() {
            if role_ids[..index].contains(role_id) {
                return Err(AppError::Validation(format!(
                    "profile role list contains '{role_id}' more than once"
                )));
            }
        }

        Ok(Self {
            id,
            uid: uid.into(),
            display_name: display_name.into(),
            email,
            role_ids,
            is_suspended,
        })
    }

    /// Returns the profile identifier.
    #[must_use]
    pub fn id(&self) -> ProfileId {
        self.id
    }

    /// Returns the identity-provider subject for this profile.
    #[must_use]
    pub fn uid(&self) -> &str {
        self.uid.as_str()
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_str()
    }

    /// Returns the email, if one is on file.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Returns the roles held by this profile, in assignment order.
    #[must_use]
    pub fn role_ids(&self) -> &[RoleId] {
        self.role_ids.as_slice()
    }

    /// Returns whether the profile is suspended.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.is_suspended
    }

    /// Returns whether the profile currently holds the role.
    #[must_use]
    pub fn holds_role(&self, role_id: RoleId) -> bool {
        self.role_ids.contains(&role_id)
    }
}

#[cfg(test)]
mod tests {
    use crate::RoleId;

    use super::{ProfileId, UserProfile};

    #[test]
    fn duplicate_role_ids_are_rejected() {
        let role_id = RoleId::new();
        let profile = UserProfile::new(
            ProfileId::new(),
            "uid-1",
            "Dana",
            None,
            vec![role_id, role_id],
            false,
        );
        assert!(profile.is_err());
    }

    #[test]
    fn role_order_is_preserved() {
        let first = RoleId::new();
        let second = RoleId::new();
        let profile = UserProfile::new(
            ProfileId::new(),
            "uid-1",
            "Dana",
            None,
            vec![first, second],
            false,
        );
        assert!(profile.is_ok_and(|profile| profile.role_ids() == [first, second]));
    }
}
