//! Attendance records and scan orchestration for Rollcall.
//!
//! Sits on top of the session layer: a [`TokenRedeemer`] decides whether a
//! scan counts and how (present or late); this crate decides what that
//! means for the student's record.
//!
//! # Key types
//!
//! - [`AttendanceDesk`] runs a scan end to end
//! - [`AttendanceRecorder`] stores records ([`MemoryRecorder`] in process)
//! - [`Roster`] answers enrollment questions ([`MemoryRoster`] in process)
//! - [`apply_upgrade`] is the status upgrade rule
//!
//! [`TokenRedeemer`]: rollcall_session::TokenRedeemer

#![allow(async_fn_in_trait)]

mod desk;
mod error;
mod keyed;
mod record;
mod recorder;
mod roster;

pub use desk::{AttendanceDesk, MarkOutcome};
pub use error::AttendanceError;
pub use record::{AttendanceRecord, apply_upgrade};
pub use recorder::{AttendanceRecorder, MemoryRecorder};
pub use roster::{MemoryRoster, Roster};
