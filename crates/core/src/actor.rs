use serde::{Deserialize, Serialize};

/// Resolved identity of the actor performing a request.
///
/// Produced by the identity layer (session, token) outside these crates and
/// handed to application services; the `uid` is the stable subject claim
/// from the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorIdentity {
    uid: String,
    display_name: String,
    email: Option<String>,
}

impl ActorIdentity {
    /// Creates an actor identity from authentication data.
    #[must_use]
    pub fn new(uid: impl Into<String>, display_name: impl Into<String>, email: Option<String>) -> Self {
        Self {
            uid: uid.into(),
            display_name: display_name.into(),
            email,
        }
    }

    /// Returns the stable subject claim from the identity provider.
    #[must_use]
    pub fn uid(&self) -> &str {
        self.uid.as_str()
    }

    /// Returns the display name for the actor.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_str()
    }

    /// Returns the email, if the provider returned one.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }
}
