//! Domain entities for the Identra RBAC core.

#![forbid(unsafe_code)]

/// User profile projection consumed by role assignment.
pub mod profile;
/// Revocation audit records.
pub mod revocation;
/// Role entity and identifiers.
pub mod role;
/// Permission scopes and the static catalog.
pub mod scope;

pub use profile::{ProfileId, UserProfile};
pub use revocation::RoleRevocation;
pub use role::{Role, RoleId};
pub use scope::{Permission, Scope, permission_catalog};
