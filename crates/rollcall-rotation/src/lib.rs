//! Token rotation for Rollcall presenters.
//!
//! While a presenter holds a session open, a background task mints a fresh
//! token on a fixed cadence and pushes it down a channel for the presenter
//! connection to forward. The task ends on its own once the session is
//! stopped or its end time passes, and is aborted when its
//! [`RotationHandle`] is dropped.
//!
//! ```text
//! spawn_rotation() ─→ issue ─→ tx ─→ wait ─→ issue ─→ tx ─→ … ─→ session closed
//!                                                                   │
//!                                          RotationHandle::stop() ──┘
//! ```

mod scheduler;

use std::sync::Arc;
use std::time::Duration;

use rollcall_protocol::SessionId;
use rollcall_session::{AttendanceStore, Clock, IssuedToken, SessionManager, TokenIssuer};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub use scheduler::{MIN_INTERVAL, RotationScheduler, RotationTick};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Rotation settings for one presenter.
#[derive(Debug, Clone)]
pub struct RotationConfig {
    /// Time between tokens. Normally equal to the token lifetime so that
    /// exactly one token is live at a time.
    pub interval: Duration,
    /// Upper bound on a random delay added before the first scheduled
    /// rotation. The immediate first token is never delayed.
    pub initial_jitter: Duration,
    /// Sweep expired tokens from the store on every rotation.
    pub purge_expired: bool,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            initial_jitter: Duration::ZERO,
            purge_expired: true,
        }
    }
}

impl RotationConfig {
    /// A config that rotates once per token lifetime.
    pub fn for_token_lifetime(lifetime: Duration) -> Self {
        Self {
            interval: lifetime,
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Owns a running rotation task. Dropping the handle stops the task.
#[derive(Debug)]
pub struct RotationHandle {
    session_id: SessionId,
    task: JoinHandle<()>,
}

impl RotationHandle {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Whether the task has exited (session closed, receiver gone, or
    /// stopped).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the rotation. Tokens already issued stay valid until they
    /// expire.
    pub fn stop(&self) {
        if !self.task.is_finished() {
            debug!(session_id = %self.session_id, "stopping rotation");
        }
        self.task.abort();
    }
}

impl Drop for RotationHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ---------------------------------------------------------------------------
// Spawning
// ---------------------------------------------------------------------------

/// Starts rotating tokens for `session_id`.
///
/// The first token is issued immediately, then one per interval. Each
/// token is sent on `tx`; the task ends when the session is no longer
/// open or the receiver is dropped. A failed issue is logged and retried
/// on the next rotation.
pub fn spawn_rotation<S, C>(
    sessions: Arc<SessionManager<S, C>>,
    issuer: Arc<TokenIssuer<S, C>>,
    session_id: SessionId,
    config: RotationConfig,
    tx: mpsc::Sender<IssuedToken>,
) -> RotationHandle
where
    S: AttendanceStore,
    C: Clock,
{
    let task = tokio::spawn(async move {
        let mut scheduler = RotationScheduler::with_jitter(config.interval, config.initial_jitter);
        info!(%session_id, interval = ?scheduler.interval(), "token rotation started");

        loop {
            if !sessions.is_session_open(session_id).await {
                info!(
                    %session_id,
                    rotations = scheduler.rotation_count(),
                    "session closed, rotation finished"
                );
                break;
            }

            if config.purge_expired {
                issuer.purge_expired().await;
            }

            match issuer.issue_token(session_id).await {
                Some(token) => {
                    if tx.send(token).await.is_err() {
                        debug!(%session_id, "token receiver dropped, rotation finished");
                        break;
                    }
                }
                None => warn!(%session_id, "token issue failed, retrying next rotation"),
            }

            scheduler.wait_for_rotation().await;
        }
    });

    RotationHandle { session_id, task }
}
