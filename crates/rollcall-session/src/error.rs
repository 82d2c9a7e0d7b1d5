//! Error types for the session layer.

use rollcall_protocol::SessionId;

/// Failures inside the persistence layer.
///
/// Whatever backs an [`AttendanceStore`](crate::AttendanceStore) (a hosted
/// database, the in-memory store) reports its faults as one of these.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached or refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// An update targeted a row that does not exist.
    #[error("no such row: {0}")]
    NotFound(String),

    /// An insert collided with an existing unique key.
    #[error("duplicate key: {0}")]
    Duplicate(String),
}

/// Errors produced while managing sessions and tokens.
///
/// Most of these never reach callers: the components convert them to
/// `Option`, `bool` or a rejected [`Redemption`](crate::Redemption) at
/// their boundary and log the detail.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Missing or malformed input, e.g. an empty class id.
    #[error("validation failed: {0}")]
    Validation(String),

    /// No unused token (or no session) matched.
    #[error("no matching token or session")]
    NotFound,

    /// The token's rotation window has passed.
    #[error("token expired")]
    TokenExpired,

    /// The session was stopped or its end time has passed.
    #[error("session {0} is closed")]
    SessionClosed(SessionId),

    /// Another redemption claimed the token first.
    #[error("token was claimed concurrently")]
    Conflict,

    /// The store failed.
    #[error(transparent)]
    Storage(#[from] StoreError),
}
