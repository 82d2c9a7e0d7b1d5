//! `RollcallServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → session/attendance.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rollcall_attendance::{AttendanceDesk, AttendanceRecorder, MemoryRecorder, Roster};
use rollcall_protocol::JsonCodec;
use rollcall_rotation::RotationConfig;
use rollcall_session::{
    AttendanceStore, Clock, MemoryStore, SessionManager, SystemClock, TokenIssuer, TokenRedeemer,
};
use rollcall_window::AttendanceConfig;

use crate::handler::handle_connection;
use crate::transport::WebSocketListener;
use crate::{Authenticator, RollcallError};

/// The current protocol version. Clients must send this in their
/// handshake or be rejected.
pub const PROTOCOL_VERSION: u32 = 1;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<S, K, R, L, A> {
    pub(crate) sessions: Arc<SessionManager<S, K>>,
    pub(crate) issuer: Arc<TokenIssuer<S, K>>,
    pub(crate) desk: AttendanceDesk<S, K, R, L>,
    pub(crate) clock: Arc<K>,
    pub(crate) auth: A,
    pub(crate) codec: JsonCodec,
    pub(crate) rotation: RotationConfig,
}

/// The storage, clock, and roster implementations a server runs on.
pub struct Backends<S, K, R, L> {
    pub store: Arc<S>,
    pub clock: Arc<K>,
    pub recorder: Arc<R>,
    pub roster: Arc<L>,
}

impl<L: Roster> Backends<MemoryStore, SystemClock, MemoryRecorder, L> {
    /// In-process stores on the system clock, with the given roster.
    pub fn in_memory(roster: Arc<L>) -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            clock: Arc::new(SystemClock),
            recorder: Arc::new(MemoryRecorder::new()),
            roster,
        }
    }
}

/// Builder for configuring and starting a Rollcall server.
///
/// # Example
///
/// ```rust,ignore
/// use rollcall::prelude::*;
///
/// let server = RollcallServer::builder()
///     .bind("0.0.0.0:8080")
///     .build(Backends::in_memory(roster), auth)
///     .await?;
/// server.run().await
/// ```
pub struct RollcallServerBuilder {
    bind_addr: String,
    config: AttendanceConfig,
    rotation: Option<RotationConfig>,
}

impl RollcallServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            config: AttendanceConfig::default(),
            rotation: None,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the attendance windows and token lifetime.
    pub fn config(mut self, config: AttendanceConfig) -> Self {
        self.config = config;
        self
    }

    /// Overrides the presenter rotation settings. By default tokens rotate
    /// once per token lifetime.
    pub fn rotation(mut self, rotation: RotationConfig) -> Self {
        self.rotation = Some(rotation);
        self
    }

    /// Binds the listener and wires the components over `backends`.
    pub async fn build<S, K, R, L, A>(
        self,
        backends: Backends<S, K, R, L>,
        auth: A,
    ) -> Result<RollcallServer<S, K, R, L, A>, RollcallError>
    where
        S: AttendanceStore,
        K: Clock,
        R: AttendanceRecorder,
        L: Roster,
        A: Authenticator,
    {
        let listener = WebSocketListener::bind(&self.bind_addr).await?;

        let config = self.config.validated();
        let rotation = self.rotation.unwrap_or_else(|| {
            RotationConfig::for_token_lifetime(Duration::from_secs(u64::from(
                config.token_lifetime_secs,
            )))
        });
        let Backends {
            store,
            clock,
            recorder,
            roster,
        } = backends;

        let redeemer = Arc::new(TokenRedeemer::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            config.clone(),
        ));
        let state = Arc::new(ServerState {
            sessions: Arc::new(SessionManager::new(
                Arc::clone(&store),
                Arc::clone(&clock),
                config.clone(),
            )),
            issuer: Arc::new(TokenIssuer::new(store, Arc::clone(&clock), config)),
            desk: AttendanceDesk::new(redeemer, recorder, roster, Arc::clone(&clock)),
            clock,
            auth,
            codec: JsonCodec,
            rotation,
        });

        Ok(RollcallServer { listener, state })
    }
}

impl Default for RollcallServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Rollcall server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct RollcallServer<S, K, R, L, A> {
    listener: WebSocketListener,
    state: Arc<ServerState<S, K, R, L, A>>,
}

impl RollcallServer<(), (), (), (), ()> {
    /// Creates a new builder.
    pub fn builder() -> RollcallServerBuilder {
        RollcallServerBuilder::new()
    }
}

impl<S, K, R, L, A> RollcallServer<S, K, R, L, A>
where
    S: AttendanceStore,
    K: Clock,
    R: AttendanceRecorder,
    L: Roster,
    A: Authenticator,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop until the process is terminated.
    ///
    /// Each connection gets its own task; a failed accept is logged and
    /// the loop carries on.
    pub async fn run(self) -> Result<(), RollcallError> {
        tracing::info!(addr = ?self.local_addr().ok(), "Rollcall server running");

        loop {
            match self.listener.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        let conn_id = conn.id();
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(%conn_id, error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
