//! End-to-end tests: a real server on a random port, driven by a
//! tokio-tungstenite client speaking the JSON envelope protocol.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use mysterybox::prelude::*;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

fn builder() -> MysteryBoxServerBuilder {
    MysteryBoxServerBuilder::new().bind("127.0.0.1:0")
}

/// Builds and spawns a server, returning its address.
async fn start_server(builder: MysteryBoxServerBuilder) -> String {
    let server = builder
        .build(MemoryStore::new())
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

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send(ws: &mut ClientWs, seq: u64, message: ClientMessage) {
    let bytes = serde_json::to_string(&Envelope::new(seq, 0, message)).expect("encode");
    ws.send(Message::Text(bytes.into())).await.expect("send");
}

async fn recv(ws: &mut ClientWs) -> ServerMessage {
    let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("reply within 2s")
        .expect("stream open")
        .expect("recv");
    let env: Envelope<ServerMessage> = serde_json::from_slice(&msg.into_data()).expect("decode");
    env.message
}

async fn request(ws: &mut ClientWs, message: ClientMessage) -> ServerMessage {
    send(ws, 1, message).await;
    recv(ws).await
}

/// Connects and completes the handshake.
async fn connect_ready(addr: &str) -> ClientWs {
    let mut ws = connect(addr).await;
    send(
        &mut ws,
        0,
        ClientMessage::Handshake {
            version: PROTOCOL_VERSION,
        },
    )
    .await;
    match recv(&mut ws).await {
        ServerMessage::HandshakeAck { .. } => ws,
        other => panic!("expected HandshakeAck, got {other:?}"),
    }
}

fn register(username: &str) -> ClientMessage {
    ClientMessage::Register {
        username: username.into(),
    }
}

fn select(username: &str, box_number: i64) -> ClientMessage {
    ClientMessage::SelectBox {
        username: username.into(),
        box_number,
    }
}

fn status(username: &str) -> ClientMessage {
    ClientMessage::Status {
        username: username.into(),
    }
}

#[track_caller]
fn assert_error(reply: ServerMessage, expected: ErrorKind) {
    match reply {
        ServerMessage::Error { code, kind, .. } => {
            assert_eq!(kind, expected);
            assert_eq!(code, expected.code());
        }
        other => panic!("expected {expected} error, got {other:?}"),
    }
}

/// Reads until the server closes the socket or an error ends the stream.
async fn assert_closed(ws: &mut ClientWs) {
    let result = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(result.is_ok(), "connection should have been closed");
}

// =========================================================================
// Handshake
// =========================================================================

#[tokio::test]
async fn test_handshake_ack_reports_board_and_budget() {
    let addr = start_server(
        builder()
            .session_config(SessionConfig { max_attempts: 4 })
            .reveal_config(RevealConfig {
                total_boxes: 50,
                win_probability: 0.1,
            }),
    )
    .await;
    let mut ws = connect(&addr).await;

    send(
        &mut ws,
        0,
        ClientMessage::Handshake {
            version: PROTOCOL_VERSION,
        },
    )
    .await;
    match recv(&mut ws).await {
        ServerMessage::HandshakeAck {
            total_boxes,
            max_attempts,
            ..
        } => {
            assert_eq!(total_boxes, 50);
            assert_eq!(max_attempts, 4);
        }
        other => panic!("expected HandshakeAck, got {other:?}"),
    }
}

#[tokio::test]
async fn test_handshake_version_mismatch_is_protocol_error() {
    let addr = start_server(builder()).await;
    let mut ws = connect(&addr).await;

    send(&mut ws, 0, ClientMessage::Handshake { version: 999 }).await;
    assert_error(recv(&mut ws).await, ErrorKind::Protocol);
    assert_closed(&mut ws).await;
}

#[tokio::test]
async fn test_handshake_non_handshake_first_message_rejected() {
    let addr = start_server(builder()).await;
    let mut ws = connect(&addr).await;

    send(&mut ws, 0, register("alice")).await;
    assert_error(recv(&mut ws).await, ErrorKind::Protocol);
}

#[tokio::test]
async fn test_handshake_timeout_drops_silent_connection() {
    let addr = start_server(builder().handshake_timeout(Duration::from_millis(100))).await;
    let mut ws = connect(&addr).await;
    assert_closed(&mut ws).await;
}

#[tokio::test]
async fn test_second_handshake_is_rejected_but_connection_survives() {
    let addr = start_server(builder()).await;
    let mut ws = connect_ready(&addr).await;

    let reply = request(
        &mut ws,
        ClientMessage::Handshake {
            version: PROTOCOL_VERSION,
        },
    )
    .await;
    assert_error(reply, ErrorKind::Protocol);
    assert_eq!(request(&mut ws, ClientMessage::Ping).await, ServerMessage::pong());
}

// =========================================================================
// Requests
// =========================================================================

#[tokio::test]
async fn test_ping_replies_pong_ok() {
    let addr = start_server(builder()).await;
    let mut ws = connect_ready(&addr).await;

    match request(&mut ws, ClientMessage::Ping).await {
        ServerMessage::Pong { status } => assert_eq!(status, "ok"),
        other => panic!("expected Pong, got {other:?}"),
    }
}

#[tokio::test]
async fn test_register_trims_username_and_grants_full_budget() {
    let addr = start_server(builder()).await;
    let mut ws = connect_ready(&addr).await;

    match request(&mut ws, register("  alice  ")).await {
        ServerMessage::Registered {
            username,
            round_id,
            remaining_attempts,
        } => {
            assert_eq!(username, "alice");
            assert!(!round_id.is_empty());
            assert_eq!(remaining_attempts, 3);
        }
        other => panic!("expected Registered, got {other:?}"),
    }
}

#[tokio::test]
async fn test_register_bad_username_is_validation_error() {
    let addr = start_server(builder()).await;
    let mut ws = connect_ready(&addr).await;

    assert_error(request(&mut ws, register("a")).await, ErrorKind::Validation);
    assert_error(
        request(&mut ws, register(&"x".repeat(21))).await,
        ErrorKind::Validation,
    );
}

#[tokio::test]
async fn test_full_round_ends_in_exhausted_409() {
    let addr = start_server(builder().session_config(SessionConfig { max_attempts: 2 })).await;
    let mut ws = connect_ready(&addr).await;
    request(&mut ws, register("alice")).await;

    for (box_number, expected) in [(5, 1), (6, 0)] {
        match request(&mut ws, select("alice", box_number)).await {
            ServerMessage::Revealed {
                box_number: opened,
                remaining_attempts,
                ..
            } => {
                assert_eq!(i64::from(opened), box_number);
                assert_eq!(remaining_attempts, expected);
            }
            other => panic!("expected Revealed, got {other:?}"),
        }
    }

    assert_error(
        request(&mut ws, select("alice", 7)).await,
        ErrorKind::Exhausted,
    );
    match request(&mut ws, status("alice")).await {
        ServerMessage::Status {
            remaining_attempts,
            exhausted,
            ..
        } => {
            assert_eq!(remaining_attempts, 0);
            assert!(exhausted);
        }
        other => panic!("expected Status, got {other:?}"),
    }
}

#[tokio::test]
async fn test_out_of_range_box_spends_nothing() {
    let addr = start_server(builder().reveal_config(RevealConfig {
        total_boxes: 10,
        win_probability: 0.1,
    }))
    .await;
    let mut ws = connect_ready(&addr).await;
    request(&mut ws, register("bob")).await;

    assert_error(request(&mut ws, select("bob", 0)).await, ErrorKind::Validation);
    assert_error(request(&mut ws, select("bob", 11)).await, ErrorKind::Validation);

    match request(&mut ws, status("bob")).await {
        ServerMessage::Status {
            remaining_attempts, ..
        } => assert_eq!(remaining_attempts, 3),
        other => panic!("expected Status, got {other:?}"),
    }
}

#[tokio::test]
async fn test_negative_and_oversized_box_numbers_are_validation_errors() {
    let addr = start_server(builder()).await;
    let mut ws = connect_ready(&addr).await;
    request(&mut ws, register("alice")).await;

    for raw in [
        r#"{"seq":1,"message":{"type":"SelectBox","username":"alice","boxNumber":-1}}"#,
        r#"{"seq":2,"message":{"type":"SelectBox","username":"alice","boxNumber":4294967296}}"#,
    ] {
        ws.send(Message::Text(raw.into())).await.expect("send");
        assert_error(recv(&mut ws).await, ErrorKind::Validation);
    }

    match request(&mut ws, status("alice")).await {
        ServerMessage::Status {
            remaining_attempts, ..
        } => assert_eq!(remaining_attempts, 3),
        other => panic!("expected Status, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_user_is_not_found_404() {
    let addr = start_server(builder()).await;
    let mut ws = connect_ready(&addr).await;

    assert_error(request(&mut ws, select("ghost", 1)).await, ErrorKind::NotFound);
    assert_error(request(&mut ws, status("ghost")).await, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_certain_win_probability_always_wins() {
    let addr = start_server(builder().reveal_config(RevealConfig {
        total_boxes: 200,
        win_probability: 1.0,
    }))
    .await;
    let mut ws = connect_ready(&addr).await;
    request(&mut ws, register("carol")).await;

    for box_number in [1, 100, 200] {
        match request(&mut ws, select("carol", box_number)).await {
            ServerMessage::Revealed { won, .. } => assert!(won),
            other => panic!("expected Revealed, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_register_again_starts_new_round() {
    let addr = start_server(builder()).await;
    let mut ws = connect_ready(&addr).await;

    let first = request(&mut ws, register("dave")).await;
    request(&mut ws, select("dave", 1)).await;
    let second = request(&mut ws, register("dave")).await;

    match (first, second) {
        (
            ServerMessage::Registered { round_id: a, .. },
            ServerMessage::Registered {
                round_id: b,
                remaining_attempts,
                ..
            },
        ) => {
            assert_ne!(a, b);
            assert_eq!(remaining_attempts, 3);
        }
        other => panic!("expected two Registered replies, got {other:?}"),
    }
}

#[tokio::test]
async fn test_sessions_are_shared_across_connections() {
    let addr = start_server(builder()).await;
    let mut ws1 = connect_ready(&addr).await;
    let mut ws2 = connect_ready(&addr).await;

    request(&mut ws1, register("erin")).await;
    request(&mut ws2, select("erin", 3)).await;

    match request(&mut ws1, status("erin")).await {
        ServerMessage::Status {
            remaining_attempts, ..
        } => assert_eq!(remaining_attempts, 2),
        other => panic!("expected Status, got {other:?}"),
    }
}

// =========================================================================
// Connection handling
// =========================================================================

#[tokio::test]
async fn test_garbage_frame_gets_protocol_error_and_connection_survives() {
    let addr = start_server(builder()).await;
    let mut ws = connect_ready(&addr).await;

    ws.send(Message::Text("not json".into())).await.expect("send");
    assert_error(recv(&mut ws).await, ErrorKind::Protocol);

    assert_eq!(request(&mut ws, ClientMessage::Ping).await, ServerMessage::pong());
}

#[tokio::test]
async fn test_disconnect_closes_connection() {
    let addr = start_server(builder()).await;
    let mut ws = connect_ready(&addr).await;

    send(
        &mut ws,
        1,
        ClientMessage::Disconnect {
            reason: "bye".into(),
        },
    )
    .await;
    assert_closed(&mut ws).await;
}

#[tokio::test]
async fn test_client_stuck_before_upgrade_does_not_delay_others() {
    let addr = start_server(builder()).await;

    // Opens TCP but never sends the HTTP upgrade request.
    let _silent = tokio::net::TcpStream::connect(&addr).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let mut ws = tokio::time::timeout(Duration::from_secs(1), connect_ready(&addr))
        .await
        .expect("handshake should not wait behind the stuck client");
    assert_eq!(request(&mut ws, ClientMessage::Ping).await, ServerMessage::pong());
}

#[tokio::test]
async fn test_idle_connection_is_closed() {
    let addr = start_server(builder().idle_timeout(Duration::from_millis(100))).await;
    let mut ws = connect_ready(&addr).await;
    assert_closed(&mut ws).await;
}

#[tokio::test]
async fn test_reply_seq_counts_up_per_connection() {
    let addr = start_server(builder()).await;
    let mut ws = connect(&addr).await;

    send(
        &mut ws,
        0,
        ClientMessage::Handshake {
            version: PROTOCOL_VERSION,
        },
    )
    .await;
    send(&mut ws, 1, ClientMessage::Ping).await;
    send(&mut ws, 2, ClientMessage::Ping).await;

    let mut seqs = Vec::new();
    for _ in 0..3 {
        let msg = ws.next().await.expect("open").expect("recv");
        let env: Envelope<ServerMessage> = serde_json::from_slice(&msg.into_data()).unwrap();
        seqs.push(env.seq);
    }
    assert_eq!(seqs, vec![0, 1, 2]);
}

// =========================================================================
// Shutdown
// =========================================================================

#[tokio::test]
async fn test_run_until_stops_and_file_store_keeps_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.json");

    let store = FileStore::open(&path).await.unwrap();
    let server = builder().build(store).await.unwrap();
    let addr = server.local_addr().unwrap().to_string();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let running = tokio::spawn(server.run_until(async {
        let _ = stop_rx.await;
    }));
    tokio::time::sleep(Duration::from_millis(10)).await;

    let mut ws = connect_ready(&addr).await;
    request(&mut ws, register("frank")).await;
    request(&mut ws, select("frank", 9)).await;

    stop_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(2), running)
        .await
        .expect("server should stop")
        .unwrap()
        .unwrap();

    let reopened = FileStore::open(&path).await.unwrap();
    let sessions = reopened.snapshot().await;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].username.as_str(), "frank");
    assert_eq!(sessions[0].remaining_attempts, 2);
}
