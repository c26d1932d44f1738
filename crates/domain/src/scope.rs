use std::str::FromStr;

use identra_core::AppError;
use serde::{Deserialize, Serialize};

/// Permission scopes enforced by application policy checks.
///
/// Declaration order is the catalog order. Every variant maps to a stable
/// dot-namespaced storage string via [`Scope::as_str`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Allows creating new roles.
    RoleCreate,
    /// Allows listing and inspecting roles.
    RoleRead,
    /// Allows changing role scopes and activation state.
    RoleUpdate,
    /// Allows permanently removing roles.
    RoleDelete,
    /// Allows attaching roles to user profiles.
    RoleAssign,
    /// Allows detaching roles from user profiles.
    RoleRevoke,
    /// Allows reading user profiles.
    UserRead,
    /// Allows updating user profiles.
    UserUpdate,
    /// Allows suspending and reinstating user profiles.
    UserSuspend,
    /// Allows approving pending onboarding applications.
    OnboardingApprove,
    /// Allows reading revocation and audit records.
    AuditRead,
}

impl Scope {
    /// Returns a stable storage value for this scope.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoleCreate => "role.create",
            Self::RoleRead => "role.read",
            Self::RoleUpdate => "role.update",
            Self::RoleDelete => "role.delete",
            Self::RoleAssign => "role.assign",
            Self::RoleRevoke => "role.revoke",
            Self::UserRead => "user.read",
            Self::UserUpdate => "user.update",
            Self::UserSuspend => "user.suspend",
            Self::OnboardingApprove => "onboarding.approve",
            Self::AuditRead => "audit.read",
        }
    }

    /// Returns the catalog group this scope belongs to.
    #[must_use]
    pub fn group(&self) -> &'static str {
        match self {
            Self::RoleCreate
            | Self::RoleRead
            | Self::RoleUpdate
            | Self::RoleDelete
            | Self::RoleAssign
            | Self::RoleRevoke => "roles",
            Self::UserRead | Self::UserUpdate | Self::UserSuspend => "users",
            Self::OnboardingApprove => "onboarding",
            Self::AuditRead => "audit",
        }
    }

    /// Returns the human-readable catalog description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::RoleCreate => "Create new roles",
            Self::RoleRead => "List and inspect roles",
            Self::RoleUpdate => "Change role scopes and activation state",
            Self::RoleDelete => "Permanently remove roles",
            Self::RoleAssign => "Attach roles to user profiles",
            Self::RoleRevoke => "Detach roles from user profiles",
            Self::UserRead => "Read user profiles",
            Self::UserUpdate => "Update user profiles",
            Self::UserSuspend => "Suspend and reinstate user profiles",
            Self::OnboardingApprove => "Approve pending onboarding applications",
            Self::AuditRead => "Read revocation and audit records",
        }
    }

    /// Returns all known scopes in catalog order.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Scope] = &[
            Scope::RoleCreate,
            Scope::RoleRead,
            Scope::RoleUpdate,
            Scope::RoleDelete,
            Scope::RoleAssign,
            Scope::RoleRevoke,
            Scope::UserRead,
            Scope::UserUpdate,
            Scope::UserSuspend,
            Scope::OnboardingApprove,
            Scope::AuditRead,
        ];

        ALL
    }
}

impl FromStr for Scope {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "role.create" => Ok(Self::RoleCreate),
            "role.read" => Ok(Self::RoleRead),
            "role.update" => Ok(Self::RoleUpdate),
            "role.delete" => Ok(Self::RoleDelete),
            "role.assign" => Ok(Self::RoleAssign),
            "role.revoke" => Ok(Self::RoleRevoke),
            "user.read" => Ok(Self::UserRead),
            "user.update" => Ok(Self::UserUpdate),
            "user.suspend" => Ok(Self::UserSuspend),
            "onboarding.approve" => Ok(Self::OnboardingApprove),
            "audit.read" => Ok(Self::AuditRead),
            _ => Err(AppError::Validation(format!("unknown scope value '{value}'"))),
        }
    }
}

/// One catalog entry describing a scope and, contextually, whether it is
/// granted.
///
/// `allowed` is never persisted; it is computed per request when a role is
/// overlaid onto the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// The scope this entry describes.
    pub scope: Scope,
    /// Catalog group label.
    pub group: String,
    /// Human-readable capability description.
    pub description: String,
    /// Whether the scope is granted in the current context.
    pub allowed: bool,
}

/// Returns the complete permission catalog in deterministic order, every
/// entry with `allowed = false`.
#[must_use]
pub fn permission_catalog() -> Vec<Permission> {
    Scope::all()
        .iter()
        .map(|scope| Permission {
            scope: *scope,
            group: scope.group().to_owned(),
            description: scope.description().to_owned(),
            allowed: false,
        })
        .collect()
}
