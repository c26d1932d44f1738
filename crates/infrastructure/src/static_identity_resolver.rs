use async_trait::async_trait;

use identra_application::IdentityResolver;
use identra_core::{ActorIdentity, AppError, AppResult};

/// Identity resolver bound to one fixed actor.
///
/// Session-derived resolution belongs to the transport layer; this adapter
/// serves the bootstrap binary and test fixtures.
pub struct StaticIdentityResolver {
    actor: Option<ActorIdentity>,
}

impl StaticIdentityResolver {
    /// Creates a resolver that always resolves to the given actor.
    #[must_use]
    pub fn new(actor: ActorIdentity) -> Self {
        Self { actor: Some(actor) }
    }

    /// Creates a resolver with no bound actor; every resolution fails with
    /// `Unauthorized`.
    #[must_use]
    pub fn unauthenticated() -> Self {
        Self { actor: None }
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentityResolver {
    async fn get_logged_in_user(&self) -> AppResult<ActorIdentity> {
        self.actor
            .clone()
            .ok_or_else(|| AppError::Unauthorized("no actor is bound to this resolver".to_owned()))
    }

    async fn get_logged_in_uid(&self) -> AppResult<String> {
        self.get_logged_in_user()
            .await
            .map(|actor| actor.uid().to_owned())
    }
}
