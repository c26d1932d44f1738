use async_trait::async_trait;

use identra_core::{ActorIdentity, AppResult};

/// Port for resolving the actor behind the current request.
///
/// Implementations live in the session/transport layer. Both methods return
/// `Unauthorized` when no actor can be resolved.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Returns the full identity of the logged-in actor.
    async fn get_logged_in_user(&self) -> AppResult<ActorIdentity>;

    /// Returns only the uid of the logged-in actor.
    async fn get_logged_in_uid(&self) -> AppResult<String>;
}
