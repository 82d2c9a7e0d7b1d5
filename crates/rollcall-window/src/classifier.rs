//! The time-window classifier.
//!
//! A session is divided into three consecutive windows measured from its
//! start:
//!
//! ```text
//!  start        +present         +late          +total
//!    │──Present──│──────Late──────│────Expired────│
//! ```
//!
//! Boundaries are inclusive on the upper edge of each open window: a claim
//! at exactly `+present` is still present, and one at exactly `+late` is
//! still late. Anything after `+late` or after `+total` is expired.

use chrono::{DateTime, TimeDelta, Utc};
use rollcall_protocol::Classification;

use crate::AttendanceConfig;

/// The classification of one instant, plus what the presenter's countdown
/// needs to render it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowStatus {
    pub status: Classification,
    /// Whole seconds until the current window closes. 0 once expired.
    pub time_remaining_secs: u64,
    /// `false` only when `status` is `Expired`.
    pub can_mark_attendance: bool,
    pub label: &'static str,
}

/// One of the three spans a session is divided into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: Classification,
    pub label: &'static str,
}

/// Returned by [`TimeWindowClassifier::validate`] when a claim arrives
/// after the attendance window closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Attendance window has closed")]
pub struct WindowClosed;

/// Classifies claim instants against a session start.
///
/// Pure: every method takes both timestamps as arguments, so tests pass
/// fixed instants instead of reading the wall clock.
#[derive(Debug, Clone)]
pub struct TimeWindowClassifier {
    config: AttendanceConfig,
}

impl TimeWindowClassifier {
    /// Creates a classifier. The config is [validated](AttendanceConfig::validated).
    pub fn new(config: AttendanceConfig) -> Self {
        Self {
            config: config.validated(),
        }
    }

    pub fn config(&self) -> &AttendanceConfig {
        &self.config
    }

    /// Classifies `now` against a session that started at `start`.
    ///
    /// A `now` earlier than `start` (clock skew between hosts) is treated
    /// as zero elapsed time.
    pub fn classify(&self, start: DateTime<Utc>, now: DateTime<Utc>) -> WindowStatus {
        let elapsed = (now - start).max(TimeDelta::zero());
        let total = self.config.session_length();

        let open = if elapsed > total {
            None
        } else if elapsed <= self.config.present_window() {
            Some((
                Classification::Present,
                self.config.present_window().min(total),
                "Present Window",
            ))
        } else if elapsed <= self.config.late_window() {
            Some((
                Classification::Late,
                self.config.late_window().min(total),
                "Late Window",
            ))
        } else {
            None
        };

        match open {
            Some((status, closes_after, label)) => {
                let remaining = (start + closes_after - now).num_seconds();
                WindowStatus {
                    status,
                    time_remaining_secs: u64::try_from(remaining).unwrap_or(0),
                    can_mark_attendance: true,
                    label,
                }
            }
            None => WindowStatus {
                status: Classification::Expired,
                time_remaining_secs: 0,
                can_mark_attendance: false,
                label: "Session Ended",
            },
        }
    }

    /// Shorthand for `classify(start, now).status`.
    pub fn classification(&self, start: DateTime<Utc>, now: DateTime<Utc>) -> Classification {
        self.classify(start, now).status
    }

    /// Returns the classification if attendance can still be marked.
    ///
    /// # Errors
    /// [`WindowClosed`] when the claim is expired.
    pub fn validate(
        &self,
        start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Classification, WindowClosed> {
        match self.classification(start, now) {
            Classification::Expired => Err(WindowClosed),
            open => Ok(open),
        }
    }

    /// The present, late and expired spans for a session starting at `start`.
    pub fn windows(&self, start: DateTime<Utc>) -> [TimeWindow; 3] {
        let present_end = start + self.config.present_window();
        let late_end = start + self.config.late_window();
        let session_end = start + self.config.session_length();
        [
            TimeWindow {
                start,
                end: present_end,
                status: Classification::Present,
                label: "Present Window",
            },
            TimeWindow {
                start: present_end,
                end: late_end,
                status: Classification::Late,
                label: "Late Window",
            },
            TimeWindow {
                start: late_end,
                end: session_end.max(late_end),
                status: Classification::Expired,
                label: "Expired",
            },
        ]
    }

    /// `true` while `now` is before the session's end.
    pub fn is_session_active(&self, start: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now < start + self.config.session_length()
    }

    /// How far through the session `now` is, as a percentage in `0.0..=100.0`.
    pub fn progress_percent(&self, start: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let total = self.config.session_length().num_milliseconds() as f64;
        let elapsed = (now - start).num_milliseconds() as f64;
        (elapsed / total * 100.0).clamp(0.0, 100.0)
    }
}

impl Default for TimeWindowClassifier {
    fn default() -> Self {
        Self::new(AttendanceConfig::default())
    }
}

/// Formats a countdown as `M:SS`.
pub fn format_remaining(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_remaining_pads_seconds() {
        assert_eq!(format_remaining(0), "0:00");
        assert_eq!(format_remaining(65), "1:05");
        assert_eq!(format_remaining(600), "10:00");
    }

    #[test]
    fn test_windows_are_contiguous() {
        let classifier = TimeWindowClassifier::default();
        let start = Utc::now();
        let [present, late, expired] = classifier.windows(start);
        assert_eq!(present.start, start);
        assert_eq!(present.end, late.start);
        assert_eq!(late.end, expired.start);
        assert_eq!(expired.status, Classification::Expired);
    }
}
