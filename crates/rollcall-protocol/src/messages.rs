//! Messages exchanged between front ends and the server.
//!
//! Every frame on the wire is an [`Envelope`]. Clients send
//! [`ClientMessage`]s, the server answers with [`ServerMessage`]s. Both enums
//! are internally tagged, so a redeem request looks like:
//!
//! ```json
//! { "seq": 3, "timestamp": 0,
//!   "payload": { "type": "RedeemToken", "request_id": 7, "token": "9f0c…" } }
//! ```
//!
//! Requests carry a client-chosen `request_id` that the matching response
//! echoes, because server-pushed `TokenRotated` frames can interleave with
//! responses on a presenter connection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AttendanceStatus, ClassId, RecordChange, SessionId, UserId};

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// What an authenticated user may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Teacher side: opens and stops sessions, displays rotating tokens.
    Presenter,
    /// Student side: redeems scanned tokens.
    Scanner,
}

// ---------------------------------------------------------------------------
// SessionSummary
// ---------------------------------------------------------------------------

/// The public view of an attendance session.
///
/// The session secret is deliberately absent; it never leaves the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub class_id: ClassId,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub active: bool,
}

// ---------------------------------------------------------------------------
// ClientMessage
// ---------------------------------------------------------------------------

/// Client → server messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Must be the first frame on a connection.
    Handshake {
        version: u32,
        token: Option<String>,
    },

    /// Keep-alive. `client_time` is echoed back untouched.
    Heartbeat { client_time: u64 },

    /// Presenter: open a session for a class, or resume the active one.
    StartSession { request_id: u64, class_id: ClassId },

    /// Presenter: close a session. Idempotent.
    StopSession {
        request_id: u64,
        session_id: SessionId,
    },

    /// Presenter: mint one rotating token on demand.
    IssueToken {
        request_id: u64,
        session_id: SessionId,
    },

    /// Scanner: redeem a decoded or typed token.
    RedeemToken { request_id: u64, token: String },

    /// Presenter: how many students are present or late so far.
    AttendanceCount { request_id: u64, class_id: ClassId },

    /// Either side is leaving.
    Disconnect { reason: String },
}

// ---------------------------------------------------------------------------
// ServerMessage
// ---------------------------------------------------------------------------

/// Server → client messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    HandshakeAck {
        user_id: UserId,
        role: Role,
        server_time: DateTime<Utc>,
    },

    HeartbeatAck {
        client_time: u64,
        server_time: DateTime<Utc>,
    },

    SessionStarted {
        request_id: u64,
        session: SessionSummary,
    },

    SessionStopped { request_id: u64, success: bool },

    TokenIssued {
        request_id: u64,
        token: String,
        expires_at: DateTime<Utc>,
    },

    /// Pushed to the presenter on every rotation while a session it
    /// started is running. Not a response to any request.
    TokenRotated {
        session_id: SessionId,
        token: String,
        expires_at: DateTime<Utc>,
    },

    Redeemed {
        request_id: u64,
        status: AttendanceStatus,
        change: RecordChange,
        message: String,
    },

    AttendanceCount {
        request_id: u64,
        class_id: ClassId,
        count: usize,
    },

    /// `code` follows HTTP conventions (400, 401, 403, 404, 500).
    /// `request_id` is `None` for failures not tied to a request.
    Error {
        request_id: Option<u64>,
        code: u16,
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The top-level frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<P> {
    /// Per-direction sequence number.
    pub seq: u64,

    /// Milliseconds since the connection was accepted (server frames) or
    /// any client-chosen clock (client frames). Informational only.
    #[serde(default)]
    pub timestamp: u64,

    pub payload: P,
}

impl<P> Envelope<P> {
    /// Wraps a payload with the given sequence number and timestamp.
    pub fn new(seq: u64, timestamp: u64, payload: P) -> Self {
        Self {
            seq,
            timestamp,
            payload,
        }
    }
}
