//! Wire protocol for Rollcall.
//!
//! This crate defines the vocabulary shared by every other layer:
//!
//! - **Identity** ([`ClassId`], [`SessionId`], [`StudentId`], ...):
//!   newtypes so a class id can never be passed where a student id is expected.
//! - **Attendance enums** ([`Classification`], [`AttendanceStatus`],
//!   [`RecordChange`]): the outcomes the core produces.
//! - **Messages** ([`ClientMessage`], [`ServerMessage`], [`Envelope`]):
//!   what presenter and scanner front ends exchange with the server.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): bytes in, messages out.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Session / Attendance (domain)
//! ```

mod codec;
mod error;
mod ids;
mod messages;
mod status;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use ids::{ClassId, CourseId, SessionId, StudentId, TokenId, UserId};
pub use messages::{ClientMessage, Envelope, Role, ServerMessage, SessionSummary};
pub use status::{AttendanceStatus, Classification, RecordChange};
