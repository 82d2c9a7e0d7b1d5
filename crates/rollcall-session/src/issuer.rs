//! Rotating token issuance and the expired-token sweep.

use std::sync::Arc;

use rollcall_protocol::{SessionId, TokenId};
use rollcall_window::AttendanceConfig;

use crate::session::{generate_secret, token_prefix};
use crate::{AttendanceStore, Clock, IssuedToken, RotatingToken};

/// Mints single-use tokens for a session and reaps expired ones.
pub struct TokenIssuer<S, C> {
    store: Arc<S>,
    clock: Arc<C>,
    config: AttendanceConfig,
}

impl<S: AttendanceStore, C: Clock> TokenIssuer<S, C> {
    pub fn new(store: Arc<S>, clock: Arc<C>, config: AttendanceConfig) -> Self {
        Self {
            store,
            clock,
            config: config.validated(),
        }
    }

    /// Issues a fresh token for `session_id`, valid for the configured
    /// token lifetime from now.
    ///
    /// Returns `None` if the token could not be persisted; the caller may
    /// simply try again on its next rotation.
    pub async fn issue_token(&self, session_id: SessionId) -> Option<IssuedToken> {
        let token = RotatingToken {
            id: TokenId::random(),
            session_id,
            value: generate_secret(),
            expires_at: self.clock.now() + self.config.token_lifetime(),
            used: false,
        };
        let issued = IssuedToken {
            session_id,
            value: token.value.clone(),
            expires_at: token.expires_at,
        };

        match self.store.insert_token(token).await {
            Ok(()) => {
                tracing::trace!(
                    %session_id,
                    token = token_prefix(&issued.value),
                    "rotating token issued"
                );
                Some(issued)
            }
            Err(e) => {
                tracing::error!(%session_id, error = %e, "failed to issue token");
                None
            }
        }
    }

    /// Deletes every token whose expiry has passed, used or not.
    ///
    /// Housekeeping only: redemption re-checks expiry and the `used` flag
    /// itself, so skipping this (or running it concurrently) never
    /// affects correctness, only storage growth. Storage failures skip
    /// the cycle and return 0.
    pub async fn purge_expired(&self) -> usize {
        match self
            .store
            .delete_tokens_expired_before(self.clock.now())
            .await
        {
            Ok(0) => 0,
            Ok(removed) => {
                tracing::debug!(removed, "purged expired tokens");
                removed
            }
            Err(e) => {
                tracing::warn!(error = %e, "token purge skipped");
                0
            }
        }
    }
}
