//! Deployment-wide attendance timing configuration.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Timing knobs for sessions and tokens.
///
/// These are set once per deployment (through the server builder), never
/// per session. Every field has a default, and `#[serde(default)]` lets a
/// config file override just the fields it cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttendanceConfig {
    /// Claims up to and including this many minutes after the session
    /// start count as present. Default: 10.
    pub present_window_minutes: u32,

    /// Claims after the present window and up to this many minutes after
    /// the start count as late. Measured from the session start, not from
    /// the end of the present window. Default: 20.
    pub late_window_minutes: u32,

    /// Total session length; the session's end timestamp is
    /// `start + total_session_minutes`. Default: 20.
    pub total_session_minutes: u32,

    /// How long a single rotating token stays redeemable. Default: 5.
    pub token_lifetime_secs: u32,
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self {
            present_window_minutes: 10,
            late_window_minutes: 20,
            total_session_minutes: 20,
            token_lifetime_secs: 5,
        }
    }
}

impl AttendanceConfig {
    /// Fixes values that would make the windows inconsistent.
    ///
    /// - `late_window_minutes` is raised to at least `present_window_minutes`.
    /// - `total_session_minutes` and `token_lifetime_secs` are at least 1.
    pub fn validated(mut self) -> Self {
        if self.late_window_minutes < self.present_window_minutes {
            warn!(
                late = self.late_window_minutes,
                present = self.present_window_minutes,
                "late window ends before present window, raising it"
            );
            self.late_window_minutes = self.present_window_minutes;
        }
        if self.total_session_minutes == 0 {
            warn!("total_session_minutes is 0, using 1");
            self.total_session_minutes = 1;
        }
        if self.token_lifetime_secs == 0 {
            warn!("token_lifetime_secs is 0, using 1");
            self.token_lifetime_secs = 1;
        }
        self
    }

    pub fn present_window(&self) -> TimeDelta {
        TimeDelta::minutes(i64::from(self.present_window_minutes))
    }

    pub fn late_window(&self) -> TimeDelta {
        TimeDelta::minutes(i64::from(self.late_window_minutes))
    }

    pub fn session_length(&self) -> TimeDelta {
        TimeDelta::minutes(i64::from(self.total_session_minutes))
    }

    pub fn token_lifetime(&self) -> TimeDelta {
        TimeDelta::seconds(i64::from(self.token_lifetime_secs))
    }
}
