//! Per-connection handler: handshake, auth, and request dispatch.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   0. Complete the WebSocket upgrade
//!   1. Receive Handshake → validate version
//!   2. Authenticate token → get Identity (user + role)
//!   3. Send HandshakeAck
//!   4. Loop: receive requests and dispatch them by role, while forwarding
//!      rotated tokens to a presenter that started a session
//!
//! A presenter connection owns at most one [`RotationHandle`]. It is
//! replaced when the presenter starts another session and dropped (which
//! stops the rotation) when the connection ends.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rollcall_attendance::{AttendanceRecorder, Roster};
use rollcall_protocol::{
    ClassId, ClientMessage, Codec, Envelope, JsonCodec, ProtocolError, Role, ServerMessage,
    SessionId,
};
use rollcall_rotation::{RotationHandle, spawn_rotation};
use rollcall_session::{AttendanceStore, Clock, IssuedToken, SessionError};
use tokio::sync::mpsc;

use crate::server::{PROTOCOL_VERSION, ServerState};
use crate::transport::{PendingConnection, TransportError, WebSocketConnection};
use crate::{Authenticator, Identity, RollcallError};

/// How long a client has to finish the WebSocket upgrade, and then again
/// to send its Handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// A connection with no inbound frame for this long is dropped.
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Rotated tokens buffered between the rotation task and the socket.
const ROTATION_BUFFER: usize = 4;

// ---------------------------------------------------------------------------
// Link: the connection plus outbound framing state
// ---------------------------------------------------------------------------

struct Link {
    conn: WebSocketConnection,
    seq: u64,
    opened: Instant,
}

impl Link {
    fn new(conn: WebSocketConnection) -> Self {
        Self {
            conn,
            seq: 0,
            opened: Instant::now(),
        }
    }

    /// Wraps `payload` in the next envelope and sends it.
    async fn send(
        &mut self,
        codec: &JsonCodec,
        payload: ServerMessage,
    ) -> Result<(), RollcallError> {
        let envelope = Envelope::new(
            next_seq(&mut self.seq),
            self.opened.elapsed().as_millis() as u64,
            payload,
        );
        let bytes = codec.encode(&envelope)?;
        self.conn.send(&bytes).await?;
        Ok(())
    }

    async fn send_error(
        &mut self,
        codec: &JsonCodec,
        request_id: Option<u64>,
        code: u16,
        message: &str,
    ) -> Result<(), RollcallError> {
        self.send(
            codec,
            ServerMessage::Error {
                request_id,
                code,
                message: message.to_string(),
            },
        )
        .await
    }
}

/// Whether the message loop should keep going.
enum Flow {
    Continue,
    Close,
}

/// Per-connection rotation state for presenters.
struct Rotation {
    tx: mpsc::Sender<IssuedToken>,
    handle: Option<RotationHandle>,
}

// ---------------------------------------------------------------------------
// Connection lifecycle
// ---------------------------------------------------------------------------

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<S, K, R, L, A>(
    pending: PendingConnection,
    state: Arc<ServerState<S, K, R, L, A>>,
) -> Result<(), RollcallError>
where
    S: AttendanceStore,
    K: Clock,
    R: AttendanceRecorder,
    L: Roster,
    A: Authenticator,
{
    let conn_id = pending.id();
    let conn = match tokio::time::timeout(HANDSHAKE_TIMEOUT, pending.upgrade()).await {
        Ok(upgraded) => upgraded?,
        Err(_) => {
            tracing::debug!(%conn_id, "WebSocket upgrade timed out");
            return Err(TransportError::AcceptFailed(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "WebSocket upgrade timed out",
            ))
            .into());
        }
    };
    tracing::debug!(%conn_id, "handling new connection");
    let mut link = Link::new(conn);

    // --- Step 1: Handshake ---
    let identity = perform_handshake(&mut link, &state).await?;
    tracing::info!(
        %conn_id,
        user_id = %identity.user_id,
        role = ?identity.role,
        "client authenticated"
    );

    // --- Step 2: Message loop ---
    let (tx, mut rotation_rx) = mpsc::channel(ROTATION_BUFFER);
    let mut rotation = Rotation { tx, handle: None };

    loop {
        tokio::select! {
            frame = tokio::time::timeout(IDLE_TIMEOUT, link.conn.recv()) => {
                let data = match frame {
                    Ok(Ok(Some(data))) => data,
                    Ok(Ok(None)) => {
                        tracing::info!(%conn_id, "connection closed cleanly");
                        break;
                    }
                    Ok(Err(e)) => {
                        tracing::debug!(%conn_id, error = %e, "recv error");
                        break;
                    }
                    Err(_) => {
                        tracing::info!(%conn_id, "connection timed out");
                        break;
                    }
                };

                let envelope: Envelope<ClientMessage> = match state.codec.decode(&data) {
                    Ok(env) => env,
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "failed to decode envelope");
                        continue;
                    }
                };

                let flow =
                    handle_request(&mut link, &state, &identity, &mut rotation, envelope.payload)
                        .await?;
                if let Flow::Close = flow {
                    break;
                }
            }
            Some(token) = rotation_rx.recv() => {
                link.send(
                    &state.codec,
                    ServerMessage::TokenRotated {
                        session_id: token.session_id,
                        token: token.value,
                        expires_at: token.expires_at,
                    },
                )
                .await?;
            }
        }
    }

    link.conn.close().await;
    // `rotation.handle` drops here and stops any running rotation.
    Ok(())
}

/// Performs the initial handshake: receive Handshake, validate, auth, send Ack.
async fn perform_handshake<S, K, R, L, A>(
    link: &mut Link,
    state: &ServerState<S, K, R, L, A>,
) -> Result<Identity, RollcallError>
where
    S: AttendanceStore,
    K: Clock,
    R: AttendanceRecorder,
    L: Roster,
    A: Authenticator,
{
    let data = match tokio::time::timeout(HANDSHAKE_TIMEOUT, link.conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage(
                "connection closed before handshake".into(),
            )
            .into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage("handshake timed out".into()).into());
        }
    };

    let envelope: Envelope<ClientMessage> = match state.codec.decode(&data) {
        Ok(env) => env,
        Err(e) => {
            link.send_error(&state.codec, None, 400, "expected Handshake").await?;
            return Err(e.into());
        }
    };

    let (version, token) = match envelope.payload {
        ClientMessage::Handshake { version, token } => (version, token),
        _ => {
            link.send_error(&state.codec, None, 400, "expected Handshake").await?;
            return Err(
                ProtocolError::InvalidMessage("first message must be Handshake".into()).into(),
            );
        }
    };

    if version != PROTOCOL_VERSION {
        link.send_error(
            &state.codec,
            None,
            400,
            &format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}"),
        )
        .await?;
        return Err(ProtocolError::InvalidMessage("protocol version mismatch".into()).into());
    }

    let identity = match state.auth.authenticate(token.as_deref().unwrap_or("")).await {
        Ok(identity) => identity,
        Err(e) => {
            link.send_error(&state.codec, None, 401, "Unauthorized").await?;
            return Err(e.into());
        }
    };

    link.send(
        &state.codec,
        ServerMessage::HandshakeAck {
            user_id: identity.user_id.clone(),
            role: identity.role,
            server_time: state.clock.now(),
        },
    )
    .await?;

    Ok(identity)
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Dispatches one client request.
async fn handle_request<S, K, R, L, A>(
    link: &mut Link,
    state: &ServerState<S, K, R, L, A>,
    identity: &Identity,
    rotation: &mut Rotation,
    msg: ClientMessage,
) -> Result<Flow, RollcallError>
where
    S: AttendanceStore,
    K: Clock,
    R: AttendanceRecorder,
    L: Roster,
    A: Authenticator,
{
    match msg {
        ClientMessage::Heartbeat { client_time } => {
            link.send(
                &state.codec,
                ServerMessage::HeartbeatAck {
                    client_time,
                    server_time: state.clock.now(),
                },
            )
            .await?;
        }

        ClientMessage::StartSession {
            request_id,
            class_id,
        } => {
            if require_role(link, state, identity, Role::Presenter, request_id).await? {
                start_session(link, state, identity, rotation, request_id, class_id).await?;
            }
        }

        ClientMessage::StopSession {
            request_id,
            session_id,
        } => {
            if require_role(link, state, identity, Role::Presenter, request_id).await? {
                stop_session(link, state, rotation, request_id, session_id).await?;
            }
        }

        ClientMessage::IssueToken {
            request_id,
            session_id,
        } => {
            if require_role(link, state, identity, Role::Presenter, request_id).await? {
                issue_token(link, state, request_id, session_id).await?;
            }
        }

        ClientMessage::RedeemToken { request_id, token } => {
            if require_role(link, state, identity, Role::Scanner, request_id).await? {
                redeem_token(link, state, identity, request_id, &token).await?;
            }
        }

        ClientMessage::AttendanceCount {
            request_id,
            class_id,
        } => {
            if require_role(link, state, identity, Role::Presenter, request_id).await? {
                match state.desk.attendance_count(&class_id).await {
                    Ok(count) => {
                        link.send(
                            &state.codec,
                            ServerMessage::AttendanceCount {
                                request_id,
                                class_id,
                                count,
                            },
                        )
                        .await?;
                    }
                    Err(e) => {
                        tracing::warn!(%class_id, error = %e, "attendance count failed");
                        let message = if e.code() == 500 {
                            "Failed to get attendance count".to_string()
                        } else {
                            e.to_string()
                        };
                        link.send_error(&state.codec, Some(request_id), e.code(), &message)
                            .await?;
                    }
                }
            }
        }

        ClientMessage::Disconnect { reason } => {
            tracing::info!(user_id = %identity.user_id, %reason, "client disconnected");
            return Ok(Flow::Close);
        }

        ClientMessage::Handshake { .. } => {
            link.send_error(&state.codec, None, 400, "already authenticated").await?;
        }
    }

    Ok(Flow::Continue)
}

/// Sends a 403 and returns `false` unless the caller holds `role`.
async fn require_role<S, K, R, L, A>(
    link: &mut Link,
    state: &ServerState<S, K, R, L, A>,
    identity: &Identity,
    role: Role,
    request_id: u64,
) -> Result<bool, RollcallError> {
    if identity.role == role {
        return Ok(true);
    }
    let message = match role {
        Role::Presenter => "Presenter role required",
        Role::Scanner => "Scanner role required",
    };
    tracing::debug!(user_id = %identity.user_id, ?role, "request refused for role");
    link.send_error(&state.codec, Some(request_id), 403, message).await?;
    Ok(false)
}

/// Returns the class's active session (or opens one) and starts pushing
/// rotated tokens for it on this connection.
async fn start_session<S, K, R, L, A>(
    link: &mut Link,
    state: &ServerState<S, K, R, L, A>,
    identity: &Identity,
    rotation: &mut Rotation,
    request_id: u64,
    class_id: ClassId,
) -> Result<(), RollcallError>
where
    S: AttendanceStore,
    K: Clock,
    R: AttendanceRecorder,
    L: Roster,
    A: Authenticator,
{
    if class_id.is_blank() {
        return link
            .send_error(&state.codec, Some(request_id), 400, "Class ID is required")
            .await;
    }

    let session = match state
        .sessions
        .start_or_resume(class_id, identity.user_id.clone())
        .await
    {
        Ok((session, resumed)) => {
            tracing::info!(session_id = %session.id, resumed, "presenter session started");
            session
        }
        Err(SessionError::Validation(message)) => {
            return link
                .send_error(&state.codec, Some(request_id), 400, &message)
                .await;
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start session");
            return link
                .send_error(&state.codec, Some(request_id), 500, "Failed to create QR session")
                .await;
        }
    };

    // Replacing the handle stops whatever this connection rotated before.
    rotation.handle = Some(spawn_rotation(
        Arc::clone(&state.sessions),
        Arc::clone(&state.issuer),
        session.id,
        state.rotation.clone(),
        rotation.tx.clone(),
    ));

    link.send(
        &state.codec,
        ServerMessage::SessionStarted {
            request_id,
            session: session.summary(),
        },
    )
    .await
}

async fn stop_session<S, K, R, L, A>(
    link: &mut Link,
    state: &ServerState<S, K, R, L, A>,
    rotation: &mut Rotation,
    request_id: u64,
    session_id: SessionId,
) -> Result<(), RollcallError>
where
    S: AttendanceStore,
    K: Clock,
    R: AttendanceRecorder,
    L: Roster,
    A: Authenticator,
{
    let success = state.sessions.end_session(session_id).await;
    if let Some(handle) = rotation.handle.take_if(|h| h.session_id() == session_id) {
        handle.stop();
    }

    link.send(
        &state.codec,
        ServerMessage::SessionStopped {
            request_id,
            success,
        },
    )
    .await
}

/// On-demand issue for clients that poll instead of taking pushed tokens.
async fn issue_token<S, K, R, L, A>(
    link: &mut Link,
    state: &ServerState<S, K, R, L, A>,
    request_id: u64,
    session_id: SessionId,
) -> Result<(), RollcallError>
where
    S: AttendanceStore,
    K: Clock,
    R: AttendanceRecorder,
    L: Roster,
    A: Authenticator,
{
    match state.sessions.get_session(session_id).await {
        None => {
            return link
                .send_error(&state.codec, Some(request_id), 404, "Session not found")
                .await;
        }
        Some(session) if !session.is_open_at(state.clock.now()) => {
            return link
                .send_error(
                    &state.codec,
                    Some(request_id),
                    400,
                    "Attendance window has closed",
                )
                .await;
        }
        Some(_) => {}
    }

    let Some(issued) = state.issuer.issue_token(session_id).await else {
        return link
            .send_error(&state.codec, Some(request_id), 500, "Failed to generate token")
            .await;
    };
    state.issuer.purge_expired().await;

    link.send(
        &state.codec,
        ServerMessage::TokenIssued {
            request_id,
            token: issued.value,
            expires_at: issued.expires_at,
        },
    )
    .await
}

async fn redeem_token<S, K, R, L, A>(
    link: &mut Link,
    state: &ServerState<S, K, R, L, A>,
    identity: &Identity,
    request_id: u64,
    token: &str,
) -> Result<(), RollcallError>
where
    S: AttendanceStore,
    K: Clock,
    R: AttendanceRecorder,
    L: Roster,
    A: Authenticator,
{
    let outcome = match state.desk.resolve_student(&identity.user_id).await {
        Ok(student_id) => state.desk.mark(&student_id, token).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(outcome) => {
            link.send(
                &state.codec,
                ServerMessage::Redeemed {
                    request_id,
                    status: outcome.status,
                    change: outcome.change,
                    message: outcome.message,
                },
            )
            .await
        }
        Err(e) => {
            let code = e.code();
            let message = if code == 500 {
                tracing::error!(user_id = %identity.user_id, error = %e, "scan failed");
                "Failed to mark attendance".to_string()
            } else {
                e.to_string()
            };
            link.send_error(&state.codec, Some(request_id), code, &message)
                .await
        }
    }
}

/// Returns the current sequence number and advances it.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}
