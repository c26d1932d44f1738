use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ProfileId, RoleId};

/// Append-only audit record written when a role is removed from a user.
///
/// Once written it is never mutated or deleted. `revoked_at` is stamped by
/// the store at write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRevocation {
    user_id: ProfileId,
    role_id: RoleId,
    reason: String,
    revoked_by: String,
    revoked_at: DateTime<Utc>,
}

impl RoleRevocation {
    /// Creates a revocation record.
    #[must_use]
    pub fn new(
        user_id: ProfileId,
        role_id: RoleId,
        reason: impl Into<String>,
        revoked_by: impl Into<String>,
        revoked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            role_id,
            reason: reason.into(),
            revoked_by: revoked_by.into(),
            revoked_at,
        }
    }

    /// Returns the profile the role was removed from.
    #[must_use]
    pub fn user_id(&self) -> ProfileId {
        self.user_id
    }

    /// Returns the revoked role.
    #[must_use]
    pub fn role_id(&self) -> RoleId {
        self.role_id
    }

    /// Returns the reason supplied by the revoking actor.
    #[must_use]
    pub fn reason(&self) -> &str {
        self.reason.as_str()
    }

    /// Returns the uid of the actor that performed the revocation.
    #[must_use]
    pub fn revoked_by(&self) -> &str {
        self.revoked_by.as_str()
    }

    /// Returns when the revocation was persisted.
    #[must_use]
    pub fn revoked_at(&self) -> DateTime<Utc> {
        self.revoked_at
    }
}
