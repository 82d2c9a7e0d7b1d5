//! Attendance time windows for Rollcall.
//!
//! Given when a session started and when a claim arrived, decide whether
//! the claimant is present, late, or too late. Everything here is pure;
//! callers supply both timestamps.
//!
//! # Key types
//!
//! - [`AttendanceConfig`]: window lengths and token lifetime
//! - [`TimeWindowClassifier`]: the classifier itself
//! - [`WindowStatus`]: a classification plus countdown data

mod classifier;
mod config;

pub use classifier::{
    TimeWindow, TimeWindowClassifier, WindowClosed, WindowStatus,
    format_remaining,
};
pub use config::AttendanceConfig;
