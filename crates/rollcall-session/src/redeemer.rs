//! Single-use token redemption.
//!
//! A redemption walks these checks in order and stops at the first
//! failure:
//!
//! 1. an unused token with this value exists (joined with its session)
//! 2. the token has not expired
//! 3. the session is active and not past its end
//! 4. classify the claim against the session start
//! 5. claim the token with a conditional write
//!
//! Only step 5 guards against two scans of the same token racing each
//! other. Steps 1–3 are plain reads and can both pass for two concurrent
//! callers; the store's compare-and-swap lets exactly one of them win.

use std::sync::Arc;

use rollcall_protocol::Classification;
use rollcall_window::{AttendanceConfig, TimeWindowClassifier};

use crate::session::token_prefix;
use crate::{AttendanceSession, AttendanceStore, Clock, SessionError};

// ---------------------------------------------------------------------------
// Redemption
// ---------------------------------------------------------------------------

/// Why a redemption was refused.
///
/// Deliberately coarse: an unknown token, a replayed one, an expired one
/// and one lost to a concurrent claim all look the same to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Unknown, already used, expired, or claimed concurrently.
    Invalid,
    /// The token was fine but its session is stopped or over.
    SessionClosed,
}

/// The outcome of [`TokenRedeemer::redeem`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redemption {
    /// The token was consumed by this call.
    Accepted {
        session: AttendanceSession,
        classification: Classification,
    },
    Rejected(Rejection),
}

impl Redemption {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    /// `Some` for accepted redemptions and for closed sessions (which
    /// classify as expired); `None` for invalid tokens.
    pub fn classification(&self) -> Option<Classification> {
        match self {
            Self::Accepted { classification, .. } => Some(*classification),
            Self::Rejected(Rejection::SessionClosed) => Some(Classification::Expired),
            Self::Rejected(Rejection::Invalid) => None,
        }
    }

    pub fn session(&self) -> Option<&AttendanceSession> {
        match self {
            Self::Accepted { session, .. } => Some(session),
            Self::Rejected(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// TokenRedeemer
// ---------------------------------------------------------------------------

/// Validates and consumes rotating tokens.
pub struct TokenRedeemer<S, C> {
    store: Arc<S>,
    clock: Arc<C>,
    classifier: TimeWindowClassifier,
}

impl<S: AttendanceStore, C: Clock> TokenRedeemer<S, C> {
    pub fn new(store: Arc<S>, clock: Arc<C>, config: AttendanceConfig) -> Self {
        Self {
            store,
            clock,
            classifier: TimeWindowClassifier::new(config),
        }
    }

    /// Redeems `token_value` at most once.
    ///
    /// Exactly one token row flips from unused to used per accepted
    /// redemption. Storage failures are logged and reported as
    /// [`Rejection::Invalid`].
    pub async fn redeem(&self, token_value: &str) -> Redemption {
        let prefix = token_prefix(token_value);
        match self.try_redeem(token_value).await {
            Ok((session, classification)) => {
                tracing::info!(
                    session_id = %session.id,
                    class_id = %session.class_id,
                    %classification,
                    "token redeemed"
                );
                Redemption::Accepted {
                    session,
                    classification,
                }
            }
            Err(SessionError::SessionClosed(session_id)) => {
                tracing::debug!(%session_id, token = prefix, "redeem refused: session closed");
                Redemption::Rejected(Rejection::SessionClosed)
            }
            Err(SessionError::Storage(e)) => {
                tracing::error!(token = prefix, error = %e, "redeem failed in storage");
                Redemption::Rejected(Rejection::Invalid)
            }
            Err(reason) => {
                tracing::debug!(token = prefix, %reason, "redeem refused");
                Redemption::Rejected(Rejection::Invalid)
            }
        }
    }

    async fn try_redeem(
        &self,
        token_value: &str,
    ) -> Result<(AttendanceSession, Classification), SessionError> {
        if token_value.is_empty() {
            return Err(SessionError::Validation("token is required".into()));
        }

        let (token, session) = self
            .store
            .unused_token(token_value)
            .await?
            .ok_or(SessionError::NotFound)?;

        let now = self.clock.now();
        if !token.is_redeemable_at(now) {
            return Err(SessionError::TokenExpired);
        }
        if !session.is_open_at(now) {
            return Err(SessionError::SessionClosed(session.id));
        }

        let classification = self.classifier.classification(session.starts_at, now);

        if !self.store.claim_token(token.id).await? {
            return Err(SessionError::Conflict);
        }

        Ok((session, classification))
    }

    pub fn classifier(&self) -> &TimeWindowClassifier {
        &self.classifier
    }
}
