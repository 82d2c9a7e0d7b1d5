//! Attendance outcome enums.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// The time-window outcome of a claim, derived from how long after the
/// session start the token was redeemed.
///
/// Serialized lowercase (`"present"`, `"late"`, `"expired"`) because that is
/// what the front ends display verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Present,
    Late,
    Expired,
}

impl Classification {
    /// The record status this classification produces, or `None` for
    /// `Expired`, which never produces a record.
    pub fn as_status(self) -> Option<AttendanceStatus> {
        match self {
            Self::Present => Some(AttendanceStatus::Present),
            Self::Late => Some(AttendanceStatus::Late),
            Self::Expired => None,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Present => "present",
            Self::Late => "late",
            Self::Expired => "expired",
        })
    }
}

// ---------------------------------------------------------------------------
// AttendanceStatus
// ---------------------------------------------------------------------------

/// The status stored on an attendance record.
///
/// `Absent` and `Excused` are set by teachers through the CRUD pages;
/// scans only ever produce `Present` or `Late`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

impl AttendanceStatus {
    /// `true` for statuses that count as attended (present or late).
    pub fn is_attended(self) -> bool {
        matches!(self, Self::Present | Self::Late)
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Late => "late",
            Self::Excused => "excused",
        })
    }
}

// ---------------------------------------------------------------------------
// RecordChange
// ---------------------------------------------------------------------------

/// What a successful scan did to the student's attendance record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordChange {
    /// No record existed; one was created.
    Created,
    /// An existing record was raised to a better status.
    Upgraded,
    /// The existing record already had an equal or better status.
    Unchanged,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_as_status_maps_expired_to_none() {
        assert_eq!(
            Classification::Present.as_status(),
            Some(AttendanceStatus::Present)
        );
        assert_eq!(
            Classification::Late.as_status(),
            Some(AttendanceStatus::Late)
        );
        assert_eq!(Classification::Expired.as_status(), None);
    }

    #[test]
    fn test_attendance_status_is_attended() {
        assert!(AttendanceStatus::Present.is_attended());
        assert!(AttendanceStatus::Late.is_attended());
        assert!(!AttendanceStatus::Absent.is_attended());
        assert!(!AttendanceStatus::Excused.is_attended());
    }

    #[test]
    fn test_classification_serializes_lowercase() {
        let json = serde_json::to_string(&Classification::Late).unwrap();
        assert_eq!(json, "\"late\"");
    }
}
