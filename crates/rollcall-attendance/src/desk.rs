//! The attendance desk: turns a scanned token into an attendance record.
//!
//! ```text
//! mark(student, token)
//!   ├─ redeem token ─────────── rejected ──→ InvalidToken
//!   ├─ classification expired ────────────→ WindowClosed
//!   ├─ class → course ────────── unknown ──→ ClassNotFound
//!   ├─ enrollment active? ─────── no ──────→ NotEnrolled
//!   └─ [lock (student, class)]
//!        find record → apply_upgrade → write (unless Unchanged)
//! ```
//!
//! Every rejected redemption reports the same [`AttendanceError::InvalidToken`],
//! so a caller cannot tell an unknown token from a used one or one whose
//! session has closed. The token is consumed by the redemption step, before
//! the roster is consulted. A scan that fails the enrollment check still
//! burns the token.

use std::sync::Arc;

use rollcall_protocol::{AttendanceStatus, ClassId, RecordChange, SessionId, StudentId, UserId};
use rollcall_session::{AttendanceStore, Clock, Redemption, TokenRedeemer};
use tracing::{debug, error, info, warn};

use crate::keyed::KeyedLocks;
use crate::record::scan_note;
use crate::{AttendanceError, AttendanceRecord, AttendanceRecorder, Roster, apply_upgrade};

/// The result of a successful [`AttendanceDesk::mark`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkOutcome {
    pub session_id: SessionId,
    pub class_id: ClassId,
    /// The record's status after the scan. For [`RecordChange::Unchanged`]
    /// this is the pre-existing status, which may differ from the
    /// classification of this scan.
    pub status: AttendanceStatus,
    pub change: RecordChange,
    pub message: String,
}

/// Orchestrates scans: redemption, roster checks, and record upserts.
pub struct AttendanceDesk<S, C, R, L> {
    redeemer: Arc<TokenRedeemer<S, C>>,
    recorder: Arc<R>,
    roster: Arc<L>,
    clock: Arc<C>,
    locks: KeyedLocks<(StudentId, ClassId)>,
}

impl<S, C, R, L> AttendanceDesk<S, C, R, L>
where
    S: AttendanceStore,
    C: Clock,
    R: AttendanceRecorder,
    L: Roster,
{
    pub fn new(
        redeemer: Arc<TokenRedeemer<S, C>>,
        recorder: Arc<R>,
        roster: Arc<L>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            redeemer,
            recorder,
            roster,
            clock,
            locks: KeyedLocks::new(),
        }
    }

    /// Maps a signed-in user to their student profile.
    ///
    /// # Errors
    /// [`AttendanceError::StudentNotFound`] if the user has no profile.
    pub async fn resolve_student(&self, user_id: &UserId) -> Result<StudentId, AttendanceError> {
        self.roster
            .student_for_user(user_id)
            .await?
            .ok_or(AttendanceError::StudentNotFound)
    }

    /// Redeems `token` on behalf of `student_id` and records the result.
    ///
    /// Re-scanning into an equal or worse status is not an error: the
    /// existing record is returned untouched, `marked_at` included.
    pub async fn mark(
        &self,
        student_id: &StudentId,
        token: &str,
    ) -> Result<MarkOutcome, AttendanceError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AttendanceError::Validation("Token is required".into()));
        }

        let redemption = self.redeemer.redeem(token).await;
        let (session, classification) = match redemption {
            Redemption::Accepted {
                session,
                classification,
            } => (session, classification),
            rejected => {
                debug!(%student_id, ?rejected, "scan rejected");
                return Err(AttendanceError::InvalidToken);
            }
        };

        let Some(fresh) = classification.as_status() else {
            debug!(%student_id, session_id = %session.id, "scan outside every window");
            return Err(AttendanceError::WindowClosed);
        };

        let class_id = session.class_id.clone();
        let course_id = self
            .roster
            .course_for_class(&class_id)
            .await?
            .ok_or_else(|| AttendanceError::ClassNotFound(class_id.clone()))?;
        if !self.roster.is_actively_enrolled(student_id, &course_id).await? {
            warn!(%student_id, %course_id, "scan by student not enrolled in course");
            return Err(AttendanceError::NotEnrolled);
        }

        let held = self.locks.acquire((student_id.clone(), class_id.clone())).await;
        let result = self.upsert(student_id, &class_id, fresh).await;
        drop(held);
        let (status, change) = result?;

        let message = match change {
            RecordChange::Created => format!("Attendance marked as {status}"),
            RecordChange::Upgraded => format!("Attendance updated to {status}"),
            RecordChange::Unchanged => format!("Attendance already marked as {status}"),
        };
        info!(
            %student_id,
            %class_id,
            session_id = %session.id,
            %status,
            ?change,
            "attendance scan recorded"
        );

        Ok(MarkOutcome {
            session_id: session.id,
            class_id,
            status,
            change,
            message,
        })
    }

    /// Read-modify-write of one record. Caller holds the key lock.
    async fn upsert(
        &self,
        student_id: &StudentId,
        class_id: &ClassId,
        fresh: AttendanceStatus,
    ) -> Result<(AttendanceStatus, RecordChange), AttendanceError> {
        let existing = self.recorder.find_record(student_id, class_id).await?;
        let existing_status = existing.as_ref().map(|r| r.status);

        let change = apply_upgrade(existing_status, fresh);
        if change == RecordChange::Unchanged {
            // `Unchanged` implies a record exists.
            return Ok((existing_status.unwrap_or(fresh), change));
        }

        self.recorder
            .upsert_record(AttendanceRecord {
                student_id: student_id.clone(),
                class_id: class_id.clone(),
                status: fresh,
                marked_at: self.clock.now(),
                notes: Some(scan_note(change, fresh)),
            })
            .await
            .inspect_err(|e| {
                error!(%student_id, %class_id, error = %e, "failed to write attendance record");
            })?;

        Ok((fresh, change))
    }

    /// Number of students marked present or late for `class_id`.
    ///
    /// # Errors
    /// - [`AttendanceError::Validation`] for a blank class id
    /// - [`AttendanceError::Storage`] if the recorder fails
    pub async fn attendance_count(&self, class_id: &ClassId) -> Result<usize, AttendanceError> {
        if class_id.is_blank() {
            return Err(AttendanceError::Validation("Class ID is required".into()));
        }
        Ok(self.recorder.count_attended(class_id).await?)
    }
}
