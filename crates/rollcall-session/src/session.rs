//! Session and token records.
//!
//! These are the two rows this layer persists:
//! - an [`AttendanceSession`] per presenter "start", bound to one class
//! - a [`RotatingToken`] per rotation, bound to one session

use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use rollcall_protocol::{ClassId, SessionId, SessionSummary, TokenId, UserId};

// ---------------------------------------------------------------------------
// AttendanceSession
// ---------------------------------------------------------------------------

/// A time-boxed window during which a class's attendance can be claimed.
///
/// `ends_at` is always exactly `starts_at + total_session_minutes`. The
/// session closes either when a presenter clears `active` or when the
/// clock passes `ends_at`; nothing sweeps sessions in the background.
#[derive(Clone, PartialEq, Eq)]
pub struct AttendanceSession {
    pub id: SessionId,
    pub class_id: ClassId,
    pub created_by: UserId,
    /// Opaque 256-bit secret kept for audit. Not used for validation.
    pub secret: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub active: bool,
}

impl AttendanceSession {
    /// `true` if claims can still be made against this session at `now`.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.active && now <= self.ends_at
    }

    /// The public view sent to front ends.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            class_id: self.class_id.clone(),
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            active: self.active,
        }
    }
}

// The secret stays out of logs.
impl fmt::Debug for AttendanceSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttendanceSession")
            .field("id", &self.id)
            .field("class_id", &self.class_id)
            .field("created_by", &self.created_by)
            .field("secret", &"<redacted>")
            .field("starts_at", &self.starts_at)
            .field("ends_at", &self.ends_at)
            .field("active", &self.active)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// RotatingToken
// ---------------------------------------------------------------------------

/// A single-use, short-lived credential proving presence at scan time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotatingToken {
    pub id: TokenId,
    pub session_id: SessionId,
    /// The secret encoded in the QR code.
    pub value: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

impl RotatingToken {
    /// `true` while the token is unused and not yet expired.
    pub fn is_redeemable_at(&self, now: DateTime<Utc>) -> bool {
        !self.used && now <= self.expires_at
    }
}

/// What the issuer hands back to the presenter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub session_id: SessionId,
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

/// Generates a 64-character hex string (256 bits of entropy).
pub(crate) fn generate_secret() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// First eight characters of a token, for log lines.
pub(crate) fn token_prefix(value: &str) -> &str {
    value.get(..8).unwrap_or(value)
}
