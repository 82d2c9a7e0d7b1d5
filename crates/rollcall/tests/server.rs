//! Integration tests for the Rollcall server, handler, and full connection flow.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rollcall::prelude::*;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Fixtures
// =========================================================================

const TEACHER: &str = "teacher-token";
const ALICE: &str = "alice-token";
const GHOST: &str = "ghost-token";
const CAROL: &str = "carol-token";

fn class() -> ClassId {
    ClassId::from("cs101-mon")
}

async fn roster() -> Arc<MemoryRoster> {
    let roster = Arc::new(MemoryRoster::new());
    roster.add_class(class(), CourseId::from("cs101")).await;
    roster
        .add_student(UserId::from("alice@school"), StudentId::from("stu-alice"))
        .await;
    roster
        .add_student(UserId::from("carol@school"), StudentId::from("stu-carol"))
        .await;
    roster
        .enroll(StudentId::from("stu-alice"), CourseId::from("cs101"))
        .await;
    roster
}

fn auth() -> StaticAuthenticator {
    StaticAuthenticator::new()
        .with_user(TEACHER, "teacher-1", Role::Presenter)
        .with_user(ALICE, "alice@school", Role::Scanner)
        .with_user(GHOST, "ghost@school", Role::Scanner)
        .with_user(CAROL, "carol@school", Role::Scanner)
}

/// Starts a server on a random port and returns the address.
async fn start_server_with(builder: RollcallServerBuilder) -> String {
    let server = builder
        .bind("127.0.0.1:0")
        .build(Backends::in_memory(roster().await), auth())
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

async fn start_server() -> String {
    start_server_with(RollcallServer::builder()).await
}

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send(ws: &mut ClientWs, payload: ClientMessage) {
    let bytes = serde_json::to_vec(&Envelope::new(0, 0, payload)).expect("encode");
    ws.send(Message::Binary(bytes.into())).await.expect("send");
}

/// Receives the next server frame, whatever it is.
async fn recv(ws: &mut ClientWs) -> ServerMessage {
    let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("frame within timeout")
        .expect("stream open")
        .expect("recv ok");
    let env: Envelope<ServerMessage> = serde_json::from_slice(&msg.into_data()).expect("decode");
    env.payload
}

/// Receives the next frame that is not a pushed `TokenRotated`.
async fn recv_reply(ws: &mut ClientWs) -> ServerMessage {
    loop {
        match recv(ws).await {
            ServerMessage::TokenRotated { .. } => continue,
            other => return other,
        }
    }
}

/// Sends a handshake and returns the reply.
async fn handshake(ws: &mut ClientWs, token: &str) -> ServerMessage {
    send(
        ws,
        ClientMessage::Handshake {
            version: PROTOCOL_VERSION,
            token: Some(token.into()),
        },
    )
    .await;
    recv(ws).await
}

async fn client(addr: &str, token: &str) -> ClientWs {
    let mut ws = connect(addr).await;
    match handshake(&mut ws, token).await {
        ServerMessage::HandshakeAck { .. } => ws,
        other => panic!("expected HandshakeAck, got {other:?}"),
    }
}

/// Starts a session as the presenter; returns its id and the first
/// rotated token.
async fn start_session(presenter: &mut ClientWs) -> (SessionId, String) {
    send(
        presenter,
        ClientMessage::StartSession {
            request_id: 1,
            class_id: class(),
        },
    )
    .await;
    let session_id = match recv(presenter).await {
        ServerMessage::SessionStarted {
            request_id,
            session,
        } => {
            assert_eq!(request_id, 1);
            assert_eq!(session.class_id, class());
            assert!(session.active);
            session.id
        }
        other => panic!("expected SessionStarted, got {other:?}"),
    };
    match recv(presenter).await {
        ServerMessage::TokenRotated {
            session_id: rotated_for,
            token,
            ..
        } => {
            assert_eq!(rotated_for, session_id);
            (session_id, token)
        }
        other => panic!("expected TokenRotated, got {other:?}"),
    }
}

async fn redeem(scanner: &mut ClientWs, request_id: u64, token: &str) -> ServerMessage {
    send(
        scanner,
        ClientMessage::RedeemToken {
            request_id,
            token: token.into(),
        },
    )
    .await;
    recv(scanner).await
}

fn assert_error(msg: ServerMessage, expected_code: u16) -> String {
    match msg {
        ServerMessage::Error { code, message, .. } => {
            assert_eq!(code, expected_code, "unexpected error: {message}");
            message
        }
        other => panic!("expected Error {expected_code}, got {other:?}"),
    }
}

// =========================================================================
// Handshake
// =========================================================================

#[tokio::test]
async fn test_handshake_success_reports_identity() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    match handshake(&mut ws, TEACHER).await {
        ServerMessage::HandshakeAck { user_id, role, .. } => {
            assert_eq!(user_id, UserId::from("teacher-1"));
            assert_eq!(role, Role::Presenter);
        }
        other => panic!("expected HandshakeAck, got {other:?}"),
    }
}

#[tokio::test]
async fn test_handshake_version_mismatch_is_400() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send(
        &mut ws,
        ClientMessage::Handshake {
            version: 999,
            token: Some(TEACHER.into()),
        },
    )
    .await;

    assert_error(recv(&mut ws).await, 400);
}

#[tokio::test]
async fn test_handshake_unknown_token_is_401() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    let reply = handshake(&mut ws, "forged").await;

    assert_eq!(assert_error(reply, 401), "Unauthorized");
}

#[tokio::test]
async fn test_handshake_non_handshake_first_message_is_400() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send(&mut ws, ClientMessage::Heartbeat { client_time: 0 }).await;

    assert_error(recv(&mut ws).await, 400);
}

// =========================================================================
// Connection basics
// =========================================================================

#[tokio::test]
async fn test_heartbeat_echoes_client_time() {
    let addr = start_server().await;
    let mut ws = client(&addr, ALICE).await;

    send(&mut ws, ClientMessage::Heartbeat { client_time: 12345 }).await;

    match recv(&mut ws).await {
        ServerMessage::HeartbeatAck { client_time, .. } => assert_eq!(client_time, 12345),
        other => panic!("expected HeartbeatAck, got {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_envelope_ignored() {
    let addr = start_server().await;
    let mut ws = client(&addr, ALICE).await;

    ws.send(Message::Binary(b"not json".to_vec().into()))
        .await
        .expect("send");
    send(&mut ws, ClientMessage::Heartbeat { client_time: 999 }).await;

    assert!(matches!(
        recv(&mut ws).await,
        ServerMessage::HeartbeatAck { .. }
    ));
}

#[tokio::test]
async fn test_disconnect_closes_connection() {
    let addr = start_server().await;
    let mut ws = client(&addr, ALICE).await;

    send(
        &mut ws,
        ClientMessage::Disconnect {
            reason: "bye".into(),
        },
    )
    .await;

    let result = tokio::time::timeout(Duration::from_secs(2), ws.next()).await;
    match result {
        Ok(Some(Ok(Message::Close(_)))) | Ok(None) => {}
        Ok(Some(Err(_))) => {}
        other => panic!("expected close, got {other:?}"),
    }
}

#[tokio::test]
async fn test_stalled_upgrade_does_not_block_other_clients() {
    let addr = start_server().await;
    // Opens TCP but never sends the HTTP upgrade request.
    let _stalled = tokio::net::TcpStream::connect(&addr).await.expect("tcp connect");

    let connected = tokio::time::timeout(
        Duration::from_secs(2),
        tokio_tungstenite::connect_async(format!("ws://{addr}")),
    )
    .await;
    let (mut ws, _) = connected
        .expect("second client should not wait on the stalled one")
        .expect("should connect");

    assert!(matches!(
        handshake(&mut ws, ALICE).await,
        ServerMessage::HandshakeAck { .. }
    ));
}

// =========================================================================
// Roles
// =========================================================================

#[tokio::test]
async fn test_scanner_cannot_start_session() {
    let addr = start_server().await;
    let mut ws = client(&addr, ALICE).await;

    send(
        &mut ws,
        ClientMessage::StartSession {
            request_id: 5,
            class_id: class(),
        },
    )
    .await;

    match recv(&mut ws).await {
        ServerMessage::Error {
            request_id, code, ..
        } => {
            assert_eq!(request_id, Some(5));
            assert_eq!(code, 403);
        }
        other => panic!("expected Error 403, got {other:?}"),
    }
}

#[tokio::test]
async fn test_presenter_cannot_redeem() {
    let addr = start_server().await;
    let mut ws = client(&addr, TEACHER).await;

    let reply = redeem(&mut ws, 2, "whatever").await;

    assert_eq!(assert_error(reply, 403), "Scanner role required");
}

// =========================================================================
// Presenter flow
// =========================================================================

#[tokio::test]
async fn test_start_session_pushes_first_token() {
    let addr = start_server().await;
    let mut presenter = client(&addr, TEACHER).await;

    let (_, token) = start_session(&mut presenter).await;

    assert_eq!(token.len(), 64);
}

#[tokio::test]
async fn test_start_session_twice_resumes_same_session() {
    let addr = start_server().await;
    let mut presenter = client(&addr, TEACHER).await;
    let (first, _) = start_session(&mut presenter).await;

    let mut other = client(&addr, TEACHER).await;
    let (second, _) = start_session(&mut other).await;

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_start_session_blank_class_is_400() {
    let addr = start_server().await;
    let mut presenter = client(&addr, TEACHER).await;

    send(
        &mut presenter,
        ClientMessage::StartSession {
            request_id: 1,
            class_id: ClassId::from("  "),
        },
    )
    .await;

    assert_eq!(
        assert_error(recv(&mut presenter).await, 400),
        "Class ID is required"
    );
}

#[tokio::test]
async fn test_rotation_pushes_fresh_tokens() {
    let addr = start_server_with(RollcallServer::builder().rotation(RotationConfig {
        interval: Duration::from_millis(150),
        ..RotationConfig::default()
    }))
    .await;
    let mut presenter = client(&addr, TEACHER).await;
    let (session_id, first) = start_session(&mut presenter).await;

    match recv(&mut presenter).await {
        ServerMessage::TokenRotated {
            session_id: rotated_for,
            token,
            ..
        } => {
            assert_eq!(rotated_for, session_id);
            assert_ne!(token, first);
        }
        other => panic!("expected TokenRotated, got {other:?}"),
    }
}

#[tokio::test]
async fn test_stop_session_then_issue_token_is_window_closed() {
    let addr = start_server().await;
    let mut presenter = client(&addr, TEACHER).await;
    let (session_id, _) = start_session(&mut presenter).await;

    send(
        &mut presenter,
        ClientMessage::StopSession {
            request_id: 2,
            session_id,
        },
    )
    .await;
    match recv_reply(&mut presenter).await {
        ServerMessage::SessionStopped {
            request_id,
            success,
        } => {
            assert_eq!(request_id, 2);
            assert!(success);
        }
        other => panic!("expected SessionStopped, got {other:?}"),
    }

    send(
        &mut presenter,
        ClientMessage::IssueToken {
            request_id: 3,
            session_id,
        },
    )
    .await;
    assert_eq!(
        assert_error(recv_reply(&mut presenter).await, 400),
        "Attendance window has closed"
    );
}

#[tokio::test]
async fn test_stop_unknown_session_reports_failure() {
    let addr = start_server().await;
    let mut presenter = client(&addr, TEACHER).await;

    send(
        &mut presenter,
        ClientMessage::StopSession {
            request_id: 9,
            session_id: SessionId::random(),
        },
    )
    .await;

    assert!(matches!(
        recv(&mut presenter).await,
        ServerMessage::SessionStopped { success: false, .. }
    ));
}

#[tokio::test]
async fn test_issue_token_unknown_session_is_404() {
    let addr = start_server().await;
    let mut presenter = client(&addr, TEACHER).await;

    send(
        &mut presenter,
        ClientMessage::IssueToken {
            request_id: 4,
            session_id: SessionId::random(),
        },
    )
    .await;

    assert_error(recv(&mut presenter).await, 404);
}

// =========================================================================
// Scanning end to end
// =========================================================================

#[tokio::test]
async fn test_scan_marks_present_then_replay_is_rejected() {
    let addr = start_server().await;
    let mut presenter = client(&addr, TEACHER).await;
    let (_, token) = start_session(&mut presenter).await;
    let mut alice = client(&addr, ALICE).await;

    match redeem(&mut alice, 10, &token).await {
        ServerMessage::Redeemed {
            request_id,
            status,
            change,
            message,
        } => {
            assert_eq!(request_id, 10);
            assert_eq!(status, AttendanceStatus::Present);
            assert_eq!(change, RecordChange::Created);
            assert_eq!(message, "Attendance marked as present");
        }
        other => panic!("expected Redeemed, got {other:?}"),
    }

    let replay = redeem(&mut alice, 11, &token).await;
    assert_eq!(assert_error(replay, 400), "Invalid or expired token");
}

#[tokio::test]
async fn test_scan_after_stop_gets_generic_invalid_token() {
    let addr = start_server().await;
    let mut presenter = client(&addr, TEACHER).await;
    let (session_id, token) = start_session(&mut presenter).await;
    send(
        &mut presenter,
        ClientMessage::StopSession {
            request_id: 2,
            session_id,
        },
    )
    .await;
    assert!(matches!(
        recv_reply(&mut presenter).await,
        ServerMessage::SessionStopped { success: true, .. }
    ));

    let mut alice = client(&addr, ALICE).await;
    let reply = redeem(&mut alice, 12, &token).await;

    assert_eq!(assert_error(reply, 400), "Invalid or expired token");
}

#[tokio::test]
async fn test_scan_with_issued_token_then_count() {
    let addr = start_server().await;
    let mut presenter = client(&addr, TEACHER).await;
    let (session_id, _) = start_session(&mut presenter).await;

    send(
        &mut presenter,
        ClientMessage::IssueToken {
            request_id: 2,
            session_id,
        },
    )
    .await;
    let token = match recv_reply(&mut presenter).await {
        ServerMessage::TokenIssued {
            request_id, token, ..
        } => {
            assert_eq!(request_id, 2);
            token
        }
        other => panic!("expected TokenIssued, got {other:?}"),
    };

    let mut alice = client(&addr, ALICE).await;
    assert!(matches!(
        redeem(&mut alice, 1, &token).await,
        ServerMessage::Redeemed { .. }
    ));

    send(
        &mut presenter,
        ClientMessage::AttendanceCount {
            request_id: 3,
            class_id: class(),
        },
    )
    .await;
    match recv_reply(&mut presenter).await {
        ServerMessage::AttendanceCount {
            request_id, count, ..
        } => {
            assert_eq!(request_id, 3);
            assert_eq!(count, 1);
        }
        other => panic!("expected AttendanceCount, got {other:?}"),
    }
}

#[tokio::test]
async fn test_scan_by_user_without_student_profile_is_404() {
    let addr = start_server().await;
    let mut presenter = client(&addr, TEACHER).await;
    let (_, token) = start_session(&mut presenter).await;
    let mut ghost = client(&addr, GHOST).await;

    let reply = redeem(&mut ghost, 1, &token).await;

    assert_eq!(assert_error(reply, 404), "Student not found");
}

#[tokio::test]
async fn test_scan_by_unenrolled_student_is_403() {
    let addr = start_server().await;
    let mut presenter = client(&addr, TEACHER).await;
    let (_, token) = start_session(&mut presenter).await;
    let mut carol = client(&addr, CAROL).await;

    let reply = redeem(&mut carol, 1, &token).await;

    assert_eq!(
        assert_error(reply, 403),
        "Student not enrolled in this course"
    );
}

#[tokio::test]
async fn test_scan_empty_token_is_400() {
    let addr = start_server().await;
    let mut alice = client(&addr, ALICE).await;

    let reply = redeem(&mut alice, 1, "").await;

    assert_eq!(assert_error(reply, 400), "Token is required");
}
