use std::sync::Arc;

use identra_core::{AppError, AppResult};
use identra_domain::Scope;

use crate::RoleStore;

/// Authorization check performed before any mutating operation.
///
/// Fails closed: a store failure propagates as an error and the gate never
/// reports a scope as granted on that path.
#[derive(Clone)]
pub struct PermissionGate {
    store: Arc<dyn RoleStore>,
}

impl PermissionGate {
    /// Creates a gate over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn RoleStore>) -> Self {
        Self { store }
    }

    /// Returns whether the scope is granted to the uid.
    pub async fn check_if_user_has_permission(&self, uid: &str, scope: Scope) -> AppResult<bool> {
        self.store.check_if_user_has_permission(uid, scope).await
    }

    /// Ensures the uid holds the scope, or fails with `Forbidden`.
    pub async fn require_permission(&self, uid: &str, scope: Scope) -> AppResult<()> {
        if self.check_if_user_has_permission(uid, scope).await? {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "uid '{uid}' is missing scope '{}'",
            scope.as_str()
        )))
    }
}
