//! WebSocket transport using `tokio-tungstenite`.
//!
//! Each connection is owned by exactly one handler task, so the stream is
//! driven through `&mut self` without any locking.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),
}

/// Opaque identifier for a connection, used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Listener
// ---------------------------------------------------------------------------

/// Accepts WebSocket connections on a TCP socket.
pub(crate) struct WebSocketListener {
    listener: TcpListener,
}

impl WebSocketListener {
    pub(crate) async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket listener bound");
        Ok(Self { listener })
    }

    pub(crate) fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Waits for the next TCP connection.
    ///
    /// The WebSocket upgrade is left to [`PendingConnection::upgrade`] so a
    /// slow client never holds up the accept loop.
    pub(crate) async fn accept(&self) -> Result<PendingConnection, TransportError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let id = ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%id, %addr, "accepted TCP connection");
        Ok(PendingConnection { id, addr, stream })
    }
}

/// A TCP connection that has not completed the WebSocket upgrade yet.
pub(crate) struct PendingConnection {
    id: ConnectionId,
    addr: SocketAddr,
    stream: TcpStream,
}

impl PendingConnection {
    pub(crate) fn id(&self) -> ConnectionId {
        self.id
    }

    /// Completes the WebSocket upgrade. Has no deadline of its own.
    pub(crate) async fn upgrade(self) -> Result<WebSocketConnection, TransportError> {
        let Self { id, addr, stream } = self;
        let ws = tokio_tungstenite::accept_async(stream).await.map_err(|e| {
            TransportError::AcceptFailed(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                e,
            ))
        })?;

        tracing::debug!(%id, %addr, "upgraded to WebSocket");
        Ok(WebSocketConnection { id, ws })
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// One upgraded WebSocket connection.
pub(crate) struct WebSocketConnection {
    id: ConnectionId,
    ws: WebSocketStream<TcpStream>,
}

impl WebSocketConnection {
    pub(crate) fn id(&self) -> ConnectionId {
        self.id
    }

    /// Sends one frame. JSON goes out as text so browser clients can read
    /// it without a decoder.
    pub(crate) async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let msg = match std::str::from_utf8(data) {
            Ok(text) => Message::Text(text.to_owned().into()),
            Err(_) => Message::Binary(data.to_vec().into()),
        };
        self.ws.send(msg).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(std::io::ErrorKind::BrokenPipe, e))
        })
    }

    /// Receives the next data frame.
    ///
    /// Returns `Ok(None)` when the peer closed the connection. Cancel safe:
    /// dropping the future never loses a frame.
    pub(crate) async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Binary(data))) => return Ok(Some(data.into())),
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_bytes().to_vec())),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/raw frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(std::io::Error::new(
                        std::io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            }
        }
    }

    /// Sends a close frame. Errors are ignored: the peer may already be gone.
    pub(crate) async fn close(&mut self) {
        let _ = self.ws.close(None).await;
    }
}
