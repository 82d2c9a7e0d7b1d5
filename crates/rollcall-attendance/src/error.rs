//! Error types for attendance marking.

use rollcall_protocol::ClassId;
use rollcall_session::StoreError;

/// Errors surfaced to a scanner when marking attendance.
///
/// These are the only user-facing failures in the scan path; everything
/// below this layer reports through `Option`, `bool`, or `Redemption`.
#[derive(Debug, thiserror::Error)]
pub enum AttendanceError {
    /// The request was malformed (missing token, blank class id).
    #[error("{0}")]
    Validation(String),

    /// The caller has no student profile.
    #[error("Student not found")]
    StudentNotFound,

    /// Unknown, replayed, expired, or concurrently claimed token.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// The session is over or the claim fell outside every window.
    #[error("Attendance window has closed")]
    WindowClosed,

    /// The session's class is missing from the roster.
    #[error("Class not found: {0}")]
    ClassNotFound(ClassId),

    /// The student is not actively enrolled in the class's course.
    #[error("Student not enrolled in this course")]
    NotEnrolled,

    /// The recorder or roster backend failed.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl AttendanceError {
    /// HTTP-style status code reported in `Error` frames.
    pub fn code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::InvalidToken | Self::WindowClosed => 400,
            Self::NotEnrolled => 403,
            Self::StudentNotFound | Self::ClassNotFound(_) => 404,
            Self::Storage(_) => 500,
        }
    }
}
