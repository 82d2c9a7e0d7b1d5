//! Unified error type for the Rollcall server.

use rollcall_protocol::ProtocolError;

use crate::AuthError;
use crate::transport::TransportError;

/// Errors that end a connection or stop the server.
///
/// Session and attendance failures never show up here: the handler turns
/// them into `Error` frames and keeps the connection open.
#[derive(Debug, thiserror::Error)]
pub enum RollcallError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The client's token was not accepted.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_protocol_error() {
        let err: RollcallError = ProtocolError::InvalidMessage("bad".into()).into();
        assert!(matches!(err, RollcallError::Protocol(_)));
        assert!(err.to_string().contains("bad"));
    }

    #[test]
    fn test_from_auth_error() {
        let err: RollcallError = AuthError::Rejected("nope".into()).into();
        assert!(matches!(err, RollcallError::Auth(_)));
    }

    #[test]
    fn test_from_transport_error_is_transparent() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "upgrade timed out");
        let err: RollcallError = TransportError::AcceptFailed(io).into();
        assert!(matches!(err, RollcallError::Transport(_)));
        assert_eq!(err.to_string(), "accept failed: upgrade timed out");
    }
}
