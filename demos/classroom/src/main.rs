//! A single-classroom Rollcall server with an in-memory roster.
//!
//! Environment:
//! - `ROLLCALL_BIND`: listen address (default `0.0.0.0:8080`)
//! - `ROLLCALL_CONFIG`: optional path to a JSON `AttendanceConfig`;
//!   missing fields take their defaults
//! - `RUST_LOG`: tracing filter (default `info`)
//!
//! Tokens: `teacher` is the presenter; `alice`, `bob` and `carol` are
//! scanners enrolled in CS 101. `dave` has a student profile but is not
//! enrolled.

use std::sync::Arc;

use rollcall::prelude::*;
use tracing_subscriber::EnvFilter;

const DEFAULT_BIND: &str = "0.0.0.0:8080";

// ---------------------------------------------------------------------------
// Seed data
// ---------------------------------------------------------------------------

const CLASS: &str = "cs101-2025-09-08";
const COURSE: &str = "cs101";
const STUDENTS: [(&str, &str); 4] = [
    ("alice", "stu-001"),
    ("bob", "stu-002"),
    ("carol", "stu-003"),
    ("dave", "stu-004"),
];
const ENROLLED: usize = 3;

async fn seed_roster() -> Arc<MemoryRoster> {
    let roster = Arc::new(MemoryRoster::new());
    roster
        .add_class(ClassId::from(CLASS), CourseId::from(COURSE))
        .await;
    for (i, (user, student)) in STUDENTS.iter().enumerate() {
        roster
            .add_student(UserId::from(*user), StudentId::from(*student))
            .await;
        if i < ENROLLED {
            roster
                .enroll(StudentId::from(*student), CourseId::from(COURSE))
                .await;
        }
    }
    roster
}

fn demo_auth() -> StaticAuthenticator {
    STUDENTS.iter().fold(
        StaticAuthenticator::new().with_user("teacher", "teacher", Role::Presenter),
        |auth, (user, _)| auth.with_user(user, *user, Role::Scanner),
    )
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

fn load_config() -> Result<AttendanceConfig, Box<dyn std::error::Error>> {
    config_from_path(std::env::var("ROLLCALL_CONFIG").ok().as_deref())
}

/// Reads `path` as JSON, or returns the defaults when there is no path.
fn config_from_path(path: Option<&str>) -> Result<AttendanceConfig, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(AttendanceConfig::default());
    };
    let raw = std::fs::read(path)?;
    let config: AttendanceConfig = serde_json::from_slice(&raw)?;
    tracing::info!(%path, "loaded attendance config");
    Ok(config)
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

async fn build_server(
    bind: &str,
    config: AttendanceConfig,
) -> Result<
    RollcallServer<MemoryStore, SystemClock, MemoryRecorder, MemoryRoster, StaticAuthenticator>,
    RollcallError,
> {
    RollcallServer::builder()
        .bind(bind)
        .config(config)
        .build(Backends::in_memory(seed_roster().await), demo_auth())
        .await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let bind = std::env::var("ROLLCALL_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());
    let config = load_config()?;
    tracing::info!(
        %bind,
        class = CLASS,
        present_minutes = config.present_window_minutes,
        late_minutes = config.late_window_minutes,
        session_minutes = config.total_session_minutes,
        "starting classroom demo"
    );

    let server = build_server(&bind, config).await?;
    server.run().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use std::time::Duration;
    use tokio_tungstenite::tungstenite::Message;

    type Ws = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn start() -> String {
        let server = build_server("127.0.0.1:0", AttendanceConfig::default())
            .await
            .unwrap();
        let addr = server.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let _ = server.run().await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        addr
    }

    async fn ws(addr: &str, token: &str) -> Ws {
        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .unwrap();
        send(
            &mut ws,
            ClientMessage::Handshake {
                version: PROTOCOL_VERSION,
                token: Some(token.into()),
            },
        )
        .await;
        let _ = recv(&mut ws).await; // HandshakeAck
        ws
    }

    async fn send(ws: &mut Ws, payload: ClientMessage) {
        let bytes = serde_json::to_vec(&Envelope::new(0, 0, payload)).unwrap();
        ws.send(Message::Text(String::from_utf8(bytes).unwrap().into()))
            .await
            .unwrap();
    }

    async fn recv(ws: &mut Ws) -> ServerMessage {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        serde_json::from_slice::<Envelope<ServerMessage>>(&msg.into_data())
            .unwrap()
            .payload
    }

    async fn open_class(teacher: &mut Ws) -> String {
        send(
            teacher,
            ClientMessage::StartSession {
                request_id: 1,
                class_id: ClassId::from(CLASS),
            },
        )
        .await;
        let _ = recv(teacher).await; // SessionStarted
        match recv(teacher).await {
            ServerMessage::TokenRotated { token, .. } => token,
            other => panic!("expected TokenRotated, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_enrolled_student_is_marked_present() {
        let addr = start().await;
        let mut teacher = ws(&addr, "teacher").await;
        let token = open_class(&mut teacher).await;

        let mut alice = ws(&addr, "alice").await;
        send(
            &mut alice,
            ClientMessage::RedeemToken {
                request_id: 1,
                token,
            },
        )
        .await;

        match recv(&mut alice).await {
            ServerMessage::Redeemed { status, .. } => {
                assert_eq!(status, AttendanceStatus::Present)
            }
            other => panic!("expected Redeemed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unenrolled_student_is_refused() {
        let addr = start().await;
        let mut teacher = ws(&addr, "teacher").await;
        let token = open_class(&mut teacher).await;

        let mut dave = ws(&addr, "dave").await;
        send(
            &mut dave,
            ClientMessage::RedeemToken {
                request_id: 1,
                token,
            },
        )
        .await;

        assert!(matches!(
            recv(&mut dave).await,
            ServerMessage::Error { code: 403, .. }
        ));
    }

    fn write_config(name: &str, body: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("rollcall-{}-{name}", std::process::id()));
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_config_from_path_without_path_is_default() {
        let config = config_from_path(None).unwrap();
        assert_eq!(config.present_window_minutes, 10);
        assert_eq!(config.total_session_minutes, 20);
    }

    #[test]
    fn test_config_from_path_reads_partial_file() {
        let path = write_config("partial.json", r#"{ "present_window_minutes": 5 }"#);

        let config = config_from_path(path.to_str()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.present_window_minutes, 5);
        assert_eq!(config.late_window_minutes, 20);
        assert_eq!(config.token_lifetime_secs, 5);
    }

    #[test]
    fn test_config_from_path_missing_file_is_error() {
        let path = std::env::temp_dir().join("rollcall-no-such-config.json");
        assert!(config_from_path(path.to_str()).is_err());
    }

    #[test]
    fn test_config_from_path_malformed_json_is_error() {
        let path = write_config("broken.json", "{ present_window_minutes: ");

        let result = config_from_path(path.to_str());
        std::fs::remove_file(&path).unwrap();

        assert!(result.is_err());
    }
}
