use crate::error::{IntakeError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};
use uuid::Uuid;

/// Opaque user identifier.
///
/// Identities become the first segment of storage keys, so path separators
/// and the relative directory names are refused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    pub fn parse<S: Into<String>>(raw: S) -> Result<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Err(IntakeError::no_identity());
        }
        if trimmed == "." || trimmed == ".." || trimmed.contains(['/', '\\']) {
            return Err(IntakeError::PreconditionFailed {
                details: format!("'{}' is not a usable user id", trimmed),
            });
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Identity {
    type Error = IntakeError;

    fn try_from(value: String) -> Result<Self> {
        Identity::parse(value)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.0
    }
}

/// Resolves the signed-in user once per session
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self) -> Option<Identity>;
}

/// Resolver that always answers with a fixed identity (or none)
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(Option<Identity>);

impl StaticIdentity {
    pub fn new(identity: Option<Identity>) -> Self {
        Self(identity)
    }

    pub fn signed_in(identity: Identity) -> Self {
        Self(Some(identity))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentity {
    async fn resolve(&self) -> Option<Identity> {
        self.0.clone()
    }
}

/// Explicit session state passed into every pipeline operation
#[derive(Debug, Clone)]
pub struct SessionContext {
    session_id: Uuid,
    identity: Option<Identity>,
}

impl SessionContext {
    /// Resolve the identity once and capture it for the rest of the session
    pub async fn bootstrap(resolver: &dyn IdentityResolver) -> Self {
        let identity = resolver.resolve().await;
        let context = Self::new(identity);

        match &context.identity {
            Some(identity) => info!(
                "Session {} bootstrapped for user {}",
                context.session_id, identity
            ),
            None => info!("Session {} bootstrapped without a user", context.session_id),
        }

        context
    }

    pub fn new(identity: Option<Identity>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            identity,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// The identity, or a precondition failure when nobody is signed in
    pub fn require_identity(&self) -> Result<&Identity> {
        self.identity.as_ref().ok_or_else(|| {
            debug!("Session {} has no identity", self.session_id);
            IntakeError::no_identity()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;

    #[test]
    fn test_identity_parse() {
        assert_eq!(Identity::parse(" u1 ").unwrap().as_str(), "u1");
        assert!(Identity::parse("").is_err());
        assert!(Identity::parse("..").is_err());
        assert!(Identity::parse("a/b").is_err());
        assert!(Identity::parse("a\\b").is_err());
    }

    #[tokio::test]
    async fn test_bootstrap_without_identity_is_precondition_failure() {
        let context = SessionContext::bootstrap(&StaticIdentity::anonymous()).await;
        let err = context.require_identity().unwrap_err();
        assert_eq!(err.kind(), FailureKind::PreconditionFailed);
    }

    #[tokio::test]
    async fn test_bootstrap_with_identity() {
        let resolver = StaticIdentity::signed_in(Identity::parse("u1").unwrap());
        let context = SessionContext::bootstrap(&resolver).await;
        assert_eq!(context.require_identity().unwrap().as_str(), "u1");
    }
}
