//! Attendance sessions and rotating tokens for Rollcall.
//!
//! This crate owns the proof-of-presence protocol:
//!
//! 1. **Sessions**: a presenter opens a time-boxed session for a class
//!    ([`SessionManager`])
//! 2. **Issuance**: short-lived random tokens are minted for the session
//!    on a fixed cadence ([`TokenIssuer`])
//! 3. **Redemption**: a scanner consumes one token exactly once and gets
//!    back a present/late/expired classification ([`TokenRedeemer`])
//!
//! Persistence sits behind the [`AttendanceStore`] trait and time behind
//! [`Clock`], so the components can be driven deterministically in tests.
//!
//! ```text
//! Attendance layer (above)  ← turns redemptions into attendance records
//!     ↕
//! Session layer (this crate)
//!     ↕
//! Window + Protocol (below)  ← classification rules, ids
//! ```

#![allow(async_fn_in_trait)]

mod clock;
mod error;
mod issuer;
mod manager;
mod redeemer;
mod session;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{SessionError, StoreError};
pub use issuer::TokenIssuer;
pub use manager::SessionManager;
pub use redeemer::{Redemption, Rejection, TokenRedeemer};
pub use session::{AttendanceSession, IssuedToken, RotatingToken};
pub use store::{AttendanceStore, MemoryStore};
