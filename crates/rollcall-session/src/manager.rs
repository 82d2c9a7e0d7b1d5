//! The session manager: opens, finds, and closes attendance sessions.
//!
//! Lifecycle of one session:
//!
//! ```text
//! create_session() ──→ [active, now < ends_at] ──(end_session)──→ [inactive]
//!                               │
//!                               └──(clock passes ends_at)──→ [ended]
//! ```
//!
//! "Ended" is never written anywhere: it is observed by comparing
//! `ends_at` with the clock whenever a session is read.

use std::sync::Arc;

use rollcall_protocol::{ClassId, SessionId, UserId};
use rollcall_window::AttendanceConfig;
use tokio::sync::Mutex;

use crate::session::generate_secret;
use crate::{AttendanceSession, AttendanceStore, Clock, SessionError};

/// Owns the lifecycle of attendance sessions.
///
/// Constructed once at startup and shared by reference; it holds no
/// per-session state of its own, everything lives in the store.
pub struct SessionManager<S, C> {
    store: Arc<S>,
    clock: Arc<C>,
    config: AttendanceConfig,
    /// Serializes [`start_or_resume`](Self::start_or_resume) so two
    /// presenters starting the same class at once get one session.
    start_gate: Mutex<()>,
}

impl<S: AttendanceStore, C: Clock> SessionManager<S, C> {
    pub fn new(store: Arc<S>, clock: Arc<C>, config: AttendanceConfig) -> Self {
        Self {
            store,
            clock,
            config: config.validated(),
            start_gate: Mutex::new(()),
        }
    }

    /// Opens a new session for `class_id`, starting now.
    ///
    /// Does not look for an existing active session; callers that must
    /// avoid duplicates use [`start_or_resume`](Self::start_or_resume).
    ///
    /// # Errors
    /// - [`SessionError::Validation`] if `class_id` is empty
    /// - [`SessionError::Storage`] if the insert fails
    pub async fn create_session(
        &self,
        class_id: ClassId,
        created_by: UserId,
    ) -> Result<AttendanceSession, SessionError> {
        if class_id.is_blank() {
            return Err(SessionError::Validation("class id is required".into()));
        }

        let now = self.clock.now();
        let session = AttendanceSession {
            id: SessionId::random(),
            class_id,
            created_by,
            secret: generate_secret(),
            starts_at: now,
            ends_at: now + self.config.session_length(),
            active: true,
        };

        self.store.insert_session(session.clone()).await.map_err(|e| {
            tracing::error!(class_id = %session.class_id, error = %e, "failed to create session");
            SessionError::Storage(e)
        })?;

        tracing::info!(
            session_id = %session.id,
            class_id = %session.class_id,
            ends_at = %session.ends_at,
            "attendance session created"
        );
        Ok(session)
    }

    /// Returns the class's active session, or opens one if there is none.
    ///
    /// The boolean is `true` when an existing session was returned.
    ///
    /// # Errors
    /// Same as [`create_session`](Self::create_session).
    pub async fn start_or_resume(
        &self,
        class_id: ClassId,
        created_by: UserId,
    ) -> Result<(AttendanceSession, bool), SessionError> {
        if class_id.is_blank() {
            return Err(SessionError::Validation("class id is required".into()));
        }

        let _gate = self.start_gate.lock().await;
        if let Some(existing) = self.get_active_session(&class_id).await {
            tracing::debug!(session_id = %existing.id, "resuming active session");
            return Ok((existing, true));
        }
        let created = self.create_session(class_id, created_by).await?;
        Ok((created, false))
    }

    /// The most recent session for `class_id` that is active and not yet
    /// past its end. Lookup failures are logged and reported as `None`.
    pub async fn get_active_session(&self, class_id: &ClassId) -> Option<AttendanceSession> {
        match self
            .store
            .latest_active_session(class_id, self.clock.now())
            .await
        {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(%class_id, error = %e, "active session lookup failed");
                None
            }
        }
    }

    /// Fetches any session by id. Lookup failures are logged and reported
    /// as `None`.
    pub async fn get_session(&self, id: SessionId) -> Option<AttendanceSession> {
        match self.store.session(id).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(session_id = %id, error = %e, "session lookup failed");
                None
            }
        }
    }

    /// Whether `id` names a session that is active and not yet over.
    pub async fn is_session_open(&self, id: SessionId) -> bool {
        self.get_session(id)
            .await
            .is_some_and(|s| s.is_open_at(self.clock.now()))
    }

    /// Marks a session inactive.
    ///
    /// Idempotent. Ending is best-effort cleanup, so storage failures
    /// (an unknown id included) are logged and reported as `false`
    /// instead of an error.
    pub async fn end_session(&self, id: SessionId) -> bool {
        match self.store.deactivate_session(id).await {
            Ok(()) => {
                tracing::info!(session_id = %id, "attendance session ended");
                true
            }
            Err(e) => {
                tracing::warn!(session_id = %id, error = %e, "failed to end session");
                false
            }
        }
    }

    pub fn config(&self) -> &AttendanceConfig {
        &self.config
    }
}
