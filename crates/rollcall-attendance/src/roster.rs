//! Who is who: user-to-student mapping, class ownership, enrollment.

use std::collections::{HashMap, HashSet};

use rollcall_protocol::{ClassId, CourseId, StudentId, UserId};
use rollcall_session::StoreError;
use tokio::sync::Mutex;

/// Read-only view of the school's roster, as needed by the scan path.
pub trait Roster: Send + Sync + 'static {
    /// The student profile belonging to a signed-in user.
    fn student_for_user(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = Result<Option<StudentId>, StoreError>> + Send;

    /// The course a class meeting belongs to.
    fn course_for_class(
        &self,
        class_id: &ClassId,
    ) -> impl Future<Output = Result<Option<CourseId>, StoreError>> + Send;

    /// Whether the student holds an active enrollment in the course.
    fn is_actively_enrolled(
        &self,
        student_id: &StudentId,
        course_id: &CourseId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;
}

// ---------------------------------------------------------------------------
// MemoryRoster
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct RosterTables {
    students: HashMap<UserId, StudentId>,
    classes: HashMap<ClassId, CourseId>,
    /// Only active enrollments are kept.
    enrollments: HashSet<(StudentId, CourseId)>,
}

/// In-process [`Roster`], seeded through its methods.
#[derive(Debug, Default)]
pub struct MemoryRoster {
    tables: Mutex<RosterTables>,
}

impl MemoryRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_student(&self, user_id: UserId, student_id: StudentId) {
        self.tables.lock().await.students.insert(user_id, student_id);
    }

    pub async fn add_class(&self, class_id: ClassId, course_id: CourseId) {
        self.tables.lock().await.classes.insert(class_id, course_id);
    }

    pub async fn enroll(&self, student_id: StudentId, course_id: CourseId) {
        self.tables
            .lock()
            .await
            .enrollments
            .insert((student_id, course_id));
    }

    /// Deactivates an enrollment. Returns `false` if there was none.
    pub async fn withdraw(&self, student_id: &StudentId, course_id: &CourseId) -> bool {
        self.tables
            .lock()
            .await
            .enrollments
            .remove(&(student_id.clone(), course_id.clone()))
    }
}

impl Roster for MemoryRoster {
    async fn student_for_user(&self, user_id: &UserId) -> Result<Option<StudentId>, StoreError> {
        Ok(self.tables.lock().await.students.get(user_id).cloned())
    }

    async fn course_for_class(&self, class_id: &ClassId) -> Result<Option<CourseId>, StoreError> {
        Ok(self.tables.lock().await.classes.get(class_id).cloned())
    }

    async fn is_actively_enrolled(
        &self,
        student_id: &StudentId,
        course_id: &CourseId,
    ) -> Result<bool, StoreError> {
        let key = (student_id.clone(), course_id.clone());
        Ok(self.tables.lock().await.enrollments.contains(&key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_withdraw_ends_enrollment() {
        let roster = MemoryRoster::new();
        let (s, c) = (StudentId::from("s1"), CourseId::from("cs101"));
        roster.enroll(s.clone(), c.clone()).await;
        assert!(roster.is_actively_enrolled(&s, &c).await.unwrap());

        assert!(roster.withdraw(&s, &c).await);
        assert!(!roster.is_actively_enrolled(&s, &c).await.unwrap());
        assert!(!roster.withdraw(&s, &c).await);
    }

    #[tokio::test]
    async fn test_unknown_lookups_are_none() {
        let roster = MemoryRoster::new();
        assert!(roster.student_for_user(&UserId::from("u")).await.unwrap().is_none());
        assert!(roster.course_for_class(&ClassId::from("c")).await.unwrap().is_none());
    }
}
