//! Persistence hook for sessions and tokens.
//!
//! Rollcall doesn't own a database. The hosting application provides an
//! [`AttendanceStore`] over whatever relational backend it already has;
//! [`MemoryStore`] is the in-process implementation used by tests and the
//! demo server.
//!
//! The one method with a hard concurrency contract is
//! [`claim_token`](AttendanceStore::claim_token): it must flip `used` from
//! `false` to `true` as a single conditional write (`UPDATE … SET used =
//! true WHERE id = $1 AND used = false`, a compare-and-swap, or a
//! transaction). A read followed by an unconditional write lets two
//! concurrent scans of one token both succeed.

use std::collections::HashMap;
use std::future::Future;

use chrono::{DateTime, Utc};
use rollcall_protocol::{ClassId, SessionId, TokenId};
use tokio::sync::Mutex;

use crate::{AttendanceSession, RotatingToken, StoreError};

/// Durable storage for sessions and rotating tokens.
///
/// All methods are async; implementations must not block the runtime
/// while waiting on I/O.
pub trait AttendanceStore: Send + Sync + 'static {
    /// Persists a new session.
    fn insert_session(
        &self,
        session: AttendanceSession,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Fetches a session by id.
    fn session(
        &self,
        id: SessionId,
    ) -> impl Future<Output = Result<Option<AttendanceSession>, StoreError>> + Send;

    /// The most recently started session for `class_id` that is still
    /// flagged active and whose `ends_at` is after `now`.
    fn latest_active_session(
        &self,
        class_id: &ClassId,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<AttendanceSession>, StoreError>> + Send;

    /// Clears the session's `active` flag. Clearing an already inactive
    /// session succeeds.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if no such session exists.
    fn deactivate_session(
        &self,
        id: SessionId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Persists a freshly issued token.
    fn insert_token(
        &self,
        token: RotatingToken,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Looks up the token with this value whose `used` flag is still
    /// false, joined with its owning session.
    fn unused_token(
        &self,
        value: &str,
    ) -> impl Future<
        Output = Result<Option<(RotatingToken, AttendanceSession)>, StoreError>,
    > + Send;

    /// Atomically sets `used = true` if it is currently false.
    ///
    /// Returns `true` if this call performed the transition and `false`
    /// if the token was already used or no longer exists.
    fn claim_token(
        &self,
        id: TokenId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Deletes every token with `expires_at < cutoff`, used or not.
    /// Returns how many rows were removed.
    fn delete_tokens_expired_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Tables {
    sessions: HashMap<SessionId, AttendanceSession>,
    tokens: HashMap<TokenId, RotatingToken>,
    /// Token value → token id. Kept in sync with `tokens`.
    token_values: HashMap<String, TokenId>,
}

/// An [`AttendanceStore`] held entirely in memory.
///
/// One async mutex guards all tables, so every method (the conditional
/// claim included) runs as a single critical section.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of token rows currently stored.
    pub async fn token_count(&self) -> usize {
        self.tables.lock().await.tokens.len()
    }

    /// Number of session rows currently stored.
    pub async fn session_count(&self) -> usize {
        self.tables.lock().await.sessions.len()
    }
}

impl AttendanceStore for MemoryStore {
    async fn insert_session(&self, session: AttendanceSession) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.sessions.contains_key(&session.id) {
            return Err(StoreError::Duplicate(session.id.to_string()));
        }
        tables.sessions.insert(session.id, session);
        Ok(())
    }

    async fn session(&self, id: SessionId) -> Result<Option<AttendanceSession>, StoreError> {
        Ok(self.tables.lock().await.sessions.get(&id).cloned())
    }

    async fn latest_active_session(
        &self,
        class_id: &ClassId,
        now: DateTime<Utc>,
    ) -> Result<Option<AttendanceSession>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .sessions
            .values()
            .filter(|s| &s.class_id == class_id && s.active && s.ends_at > now)
            .max_by_key(|s| s.starts_at)
            .cloned())
    }

    async fn deactivate_session(&self, id: SessionId) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let session = tables
            .sessions
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        session.active = false;
        Ok(())
    }

    async fn insert_token(&self, token: RotatingToken) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.token_values.contains_key(&token.value) {
            return Err(StoreError::Duplicate(token.id.to_string()));
        }
        tables.token_values.insert(token.value.clone(), token.id);
        tables.tokens.insert(token.id, token);
        Ok(())
    }

    async fn unused_token(
        &self,
        value: &str,
    ) -> Result<Option<(RotatingToken, AttendanceSession)>, StoreError> {
        let tables = self.tables.lock().await;
        let found = tables
            .token_values
            .get(value)
            .and_then(|id| tables.tokens.get(id))
            .filter(|token| !token.used)
            .and_then(|token| {
                tables
                    .sessions
                    .get(&token.session_id)
                    .map(|session| (token.clone(), session.clone()))
            });
        Ok(found)
    }

    async fn claim_token(&self, id: TokenId) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        match tables.tokens.get_mut(&id) {
            Some(token) if !token.used => {
                token.used = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_tokens_expired_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let mut tables = self.tables.lock().await;
        let Tables {
            tokens,
            token_values,
            ..
        } = &mut *tables;

        let before = tokens.len();
        tokens.retain(|_, token| {
            if token.expires_at < cutoff {
                token_values.remove(&token.value);
                false
            } else {
                true
            }
        });
        Ok(before - tokens.len())
    }
}
