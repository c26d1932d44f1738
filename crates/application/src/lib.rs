//! Application services and ports for the Identra RBAC core.

#![forbid(unsafe_code)]

mod identity_ports;
mod permission_gate;
mod role_assignment_service;
mod role_lifecycle_service;
mod role_output;
mod role_ports;

pub use identity_ports::IdentityResolver;
pub use permission_gate::PermissionGate;
pub use role_assignment_service::RoleAssignmentService;
pub use role_lifecycle_service::RoleLifecycleService;
pub use role_output::RoleOutput;
pub use role_ports::{RoleInput, RoleRevocationInput, RoleStore, UpdateRoleScopesInput};
