//! Shared fixtures for the session integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rollcall_protocol::{ClassId, SessionId, TokenId};
use rollcall_session::{
    AttendanceSession, AttendanceStore, ManualClock, MemoryStore, RotatingToken,
    SessionManager, StoreError, TokenIssuer, TokenRedeemer,
};
use rollcall_window::AttendanceConfig;

/// Session start used by every scenario ("T").
pub fn t() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 8, 10, 0, 0).unwrap()
}

/// The three components wired to one in-memory store and one manual clock.
pub struct Rig {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub sessions: SessionManager<MemoryStore, ManualClock>,
    pub issuer: TokenIssuer<MemoryStore, ManualClock>,
    pub redeemer: Arc<TokenRedeemer<MemoryStore, ManualClock>>,
}

pub fn rig() -> Rig {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(t()));
    let config = AttendanceConfig::default();
    Rig {
        sessions: SessionManager::new(store.clone(), clock.clone(), config.clone()),
        issuer: TokenIssuer::new(store.clone(), clock.clone(), config.clone()),
        redeemer: Arc::new(TokenRedeemer::new(store.clone(), clock.clone(), config)),
        store,
        clock,
    }
}

/// A store whose backend is permanently unreachable.
pub struct DownStore;

fn down() -> StoreError {
    StoreError::Unavailable("connection refused".into())
}

impl AttendanceStore for DownStore {
    async fn insert_session(&self, _: AttendanceSession) -> Result<(), StoreError> {
        Err(down())
    }

    async fn session(&self, _: SessionId) -> Result<Option<AttendanceSession>, StoreError> {
        Err(down())
    }

    async fn latest_active_session(
        &self,
        _: &ClassId,
        _: DateTime<Utc>,
    ) -> Result<Option<AttendanceSession>, StoreError> {
        Err(down())
    }

    async fn deactivate_session(&self, _: SessionId) -> Result<(), StoreError> {
        Err(down())
    }

    async fn insert_token(&self, _: RotatingToken) -> Result<(), StoreError> {
        Err(down())
    }

    async fn unused_token(
        &self,
        _: &str,
    ) -> Result<Option<(RotatingToken, AttendanceSession)>, StoreError> {
        Err(down())
    }

    async fn claim_token(&self, _: TokenId) -> Result<bool, StoreError> {
        Err(down())
    }

    async fn delete_tokens_expired_before(&self, _: DateTime<Utc>) -> Result<usize, StoreError> {
        Err(down())
    }
}
