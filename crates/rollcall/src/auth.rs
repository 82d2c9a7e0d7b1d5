//! Authentication hook.
//!
//! Rollcall does not manage logins. Whatever issues the front end's session
//! token (a hosted auth provider, a campus SSO bridge) sits behind
//! [`Authenticator`], which the server calls once per connection during
//! the handshake.

use std::collections::HashMap;
use std::future::Future;

use rollcall_protocol::{Role, UserId};

/// Who is on the other end of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub role: Role,
}

/// Authentication failures. Both are reported to the client as 401.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The token is missing, malformed, expired, or unknown.
    #[error("authentication failed: {0}")]
    Rejected(String),

    /// The identity provider could not be reached.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Validates a client's token and returns their identity.
///
/// # Example
///
/// ```rust
/// use rollcall::{AuthError, Authenticator, Identity};
/// use rollcall_protocol::{Role, UserId};
///
/// /// Treats every token as a scanner's user id. Development only.
/// struct EveryoneScans;
///
/// impl Authenticator for EveryoneScans {
///     async fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
///         if token.is_empty() {
///             return Err(AuthError::Rejected("empty token".into()));
///         }
///         Ok(Identity { user_id: UserId::from(token), role: Role::Scanner })
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    fn authenticate(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<Identity, AuthError>> + Send;
}

/// An [`Authenticator`] backed by a fixed token table.
///
/// Handy for demos and tests; production deployments verify real tokens.
#[derive(Debug, Default, Clone)]
pub struct StaticAuthenticator {
    tokens: HashMap<String, Identity>,
}

impl StaticAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `token` as identifying `user_id` in `role`.
    pub fn with_user(mut self, token: &str, user_id: impl Into<UserId>, role: Role) -> Self {
        self.tokens.insert(
            token.to_owned(),
            Identity {
                user_id: user_id.into(),
                role,
            },
        );
        self
    }
}

impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| AuthError::Rejected("unknown token".into()))
    }
}
