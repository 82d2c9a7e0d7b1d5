//! Attendance record persistence.
//!
//! [`AttendanceRecorder`] is the seam to whatever database owns the
//! attendance table. [`MemoryRecorder`] keeps records in process.

use std::collections::HashMap;

use rollcall_protocol::{ClassId, StudentId};
use rollcall_session::StoreError;
use tokio::sync::Mutex;

use crate::AttendanceRecord;

/// Storage for attendance records, at most one per (student, class).
pub trait AttendanceRecorder: Send + Sync + 'static {
    /// The record for this student and class, if any.
    fn find_record(
        &self,
        student_id: &StudentId,
        class_id: &ClassId,
    ) -> impl Future<Output = Result<Option<AttendanceRecord>, StoreError>> + Send;

    /// Inserts the record, or replaces the one with the same
    /// (student, class) key.
    fn upsert_record(
        &self,
        record: AttendanceRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Number of records for the class whose status is present or late.
    fn count_attended(
        &self,
        class_id: &ClassId,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;
}

// ---------------------------------------------------------------------------
// MemoryRecorder
// ---------------------------------------------------------------------------

/// In-process [`AttendanceRecorder`].
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    records: Mutex<HashMap<(StudentId, ClassId), AttendanceRecord>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records for a class, in no particular order.
    pub async fn records_for_class(&self, class_id: &ClassId) -> Vec<AttendanceRecord> {
        self.records
            .lock()
            .await
            .values()
            .filter(|r| &r.class_id == class_id)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }
}

impl AttendanceRecorder for MemoryRecorder {
    async fn find_record(
        &self,
        student_id: &StudentId,
        class_id: &ClassId,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        let key = (student_id.clone(), class_id.clone());
        Ok(self.records.lock().await.get(&key).cloned())
    }

    async fn upsert_record(&self, record: AttendanceRecord) -> Result<(), StoreError> {
        let key = (record.student_id.clone(), record.class_id.clone());
        self.records.lock().await.insert(key, record);
        Ok(())
    }

    async fn count_attended(&self, class_id: &ClassId) -> Result<usize, StoreError> {
        Ok(self
            .records
            .lock()
            .await
            .values()
            .filter(|r| &r.class_id == class_id && r.status.is_attended())
            .count())
    }
}
