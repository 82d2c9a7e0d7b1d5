//! Attendance records and the scan upgrade rule.

use chrono::{DateTime, Utc};
use rollcall_protocol::{AttendanceStatus, ClassId, RecordChange, StudentId};
use serde::{Deserialize, Serialize};

/// One student's attendance for one class meeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub student_id: StudentId,
    pub class_id: ClassId,
    pub status: AttendanceStatus,
    pub marked_at: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Position of a status in the scan ordering `absent < late < present`.
///
/// `None` for `Excused`, which sits outside the ordering.
fn scan_rank(status: AttendanceStatus) -> Option<u8> {
    match status {
        AttendanceStatus::Absent => Some(0),
        AttendanceStatus::Late => Some(1),
        AttendanceStatus::Present => Some(2),
        AttendanceStatus::Excused => None,
    }
}

/// Decides what a scan yielding `fresh` does to a record currently at
/// `existing`.
///
/// Only a strict improvement upgrades. An excused record is never touched,
/// and neither is anything when `fresh` itself is excused.
pub fn apply_upgrade(existing: Option<AttendanceStatus>, fresh: AttendanceStatus) -> RecordChange {
    let Some(current) = existing else {
        return RecordChange::Created;
    };
    match (scan_rank(current), scan_rank(fresh)) {
        (Some(have), Some(new)) if new > have => RecordChange::Upgraded,
        _ => RecordChange::Unchanged,
    }
}

/// The note stored with a scan-written record.
pub(crate) fn scan_note(change: RecordChange, status: AttendanceStatus) -> String {
    match change {
        RecordChange::Upgraded => format!("Updated via QR code scan - {status}"),
        _ => format!("Marked via QR code scan - {status}"),
    }
}
