//! # Rollcall
//!
//! Classroom attendance over rotating single-use QR tokens.
//!
//! A presenter (teacher) opens a time-boxed session for a class and shows a
//! token that rotates every few seconds. A scanner (student) redeems one
//! token and is marked present or late depending on when, relative to the
//! session start, the scan arrives. Tokens are single use, so a screenshot
//! passed around the room is worth one scan at most, for a few seconds.
//!
//! This crate is the WebSocket server; the pieces it wires together live in
//! the `rollcall-*` crates and are re-exported from [`prelude`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use rollcall::prelude::*;
//!
//! # async fn run() -> Result<(), RollcallError> {
//! let roster = Arc::new(MemoryRoster::new());
//! let auth = StaticAuthenticator::new().with_user("t-token", "teacher-1", Role::Presenter);
//!
//! let server = RollcallServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build(Backends::in_memory(roster), auth)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod auth;
mod error;
mod handler;
mod server;
mod transport;

pub use auth::{AuthError, Authenticator, Identity, StaticAuthenticator};
pub use error::RollcallError;
pub use server::{Backends, PROTOCOL_VERSION, RollcallServer, RollcallServerBuilder};
pub use transport::{ConnectionId, TransportError};

pub use rollcall_attendance as attendance;
pub use rollcall_protocol as protocol;
pub use rollcall_rotation as rotation;
pub use rollcall_session as session;
pub use rollcall_window as window;

/// Everything needed to stand up a server and talk to it.
pub mod prelude {
    pub use crate::{
        AuthError, Authenticator, Backends, Identity, PROTOCOL_VERSION, RollcallError,
        RollcallServer, RollcallServerBuilder, StaticAuthenticator,
    };
    pub use rollcall_attendance::{
        AttendanceDesk, AttendanceError, AttendanceRecord, AttendanceRecorder, MarkOutcome,
        MemoryRecorder, MemoryRoster, Roster,
    };
    pub use rollcall_protocol::{
        AttendanceStatus, ClassId, Classification, ClientMessage, Codec, CourseId, Envelope,
        JsonCodec, RecordChange, Role, ServerMessage, SessionId, SessionSummary, StudentId,
        UserId,
    };
    pub use rollcall_rotation::RotationConfig;
    pub use rollcall_session::{
        AttendanceStore, Clock, ManualClock, MemoryStore, SessionManager, SystemClock,
        TokenIssuer, TokenRedeemer,
    };
    pub use rollcall_window::{AttendanceConfig, TimeWindowClassifier};
}
