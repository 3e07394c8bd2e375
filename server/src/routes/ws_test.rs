use super::*;
use crate::shared;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio::time::{Duration, timeout};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const ADD_TWO: &str = r#"{"obj":"calc","method":"AddTwo","args":[4,3]}"#;

fn sample_registry() -> Registry {
    let registry = Registry::new();
    shared::register_samples(&registry).expect("samples");
    registry
}

fn text(body: &str) -> Message {
    Message::Text(body.to_owned().into())
}

fn expect_reply(step: Step) -> String {
    match step {
        Step::Reply(text) => text,
        other => panic!("expected reply, got {other:?}"),
    }
}

// =============================================================================
// process_message
// =============================================================================

#[test]
fn text_request_is_dispatched() {
    let registry = sample_registry();
    let reply = expect_reply(process_message(&registry, Uuid::new_v4(), text(ADD_TWO)));
    assert_eq!(reply, r#"{"error":"","result":7}"#);
}

#[test]
fn binary_request_is_dispatched() {
    let registry = sample_registry();
    let msg = Message::Binary(ADD_TWO.as_bytes().to_vec().into());
    let reply = expect_reply(process_message(&registry, Uuid::new_v4(), msg));
    assert_eq!(reply, r#"{"error":"","result":7}"#);
}

#[test]
fn unregistered_target_replies_with_fixed_text() {
    let registry = sample_registry();
    let body = r#"{"obj":"ghost","method":"Anything","args":[]}"#;
    let reply = expect_reply(process_message(&registry, Uuid::new_v4(), text(body)));
    assert_eq!(reply, r#"{"error":"Requested object is not registered.","result":null}"#);
}

#[test]
fn oversize_message_closes_with_1009() {
    let registry = sample_registry();
    let body = "x".repeat(MAX_MESSAGE_SIZE + 1);

    match process_message(&registry, Uuid::new_v4(), text(&body)) {
        Step::Close(frame) => {
            assert_eq!(frame.code, close_code::SIZE);
            assert_eq!(frame.reason.as_str(), "Message frame exceeded 1024 bytes.");
        }
        other => panic!("expected close, got {other:?}"),
    }
}

#[test]
fn message_at_the_limit_is_processed() {
    let registry = sample_registry();
    let mut body = ADD_TWO.to_owned();
    body.push_str(&" ".repeat(MAX_MESSAGE_SIZE - ADD_TWO.len()));
    assert_eq!(body.len(), MAX_MESSAGE_SIZE);

    let reply = expect_reply(process_message(&registry, Uuid::new_v4(), text(&body)));
    assert_eq!(reply, r#"{"error":"","result":7}"#);
}

#[test]
fn malformed_json_gets_an_error_reply() {
    let registry = sample_registry();
    let reply = expect_reply(process_message(&registry, Uuid::new_v4(), text("{not json")));
    let decoded = envelope::decode_result(&reply).expect("decode reply");
    assert_eq!(decoded, ResultEnvelope::failure(envelope::MALFORMED_REQUEST));
}

#[test]
fn invalid_utf8_gets_an_error_reply() {
    let registry = sample_registry();
    let msg = Message::Binary(vec![0xff, 0xfe, 0xfd].into());
    let reply = expect_reply(process_message(&registry, Uuid::new_v4(), msg));
    assert!(reply.contains(envelope::MALFORMED_REQUEST));
}

#[test]
fn control_frames_are_skipped_and_close_ends() {
    let registry = sample_registry();
    let id = Uuid::new_v4();
    assert!(matches!(process_message(&registry, id, Message::Ping(Vec::<u8>::new().into())), Step::Skip));
    assert!(matches!(process_message(&registry, id, Message::Pong(Vec::<u8>::new().into())), Step::Skip));
    assert!(matches!(process_message(&registry, id, Message::Close(None)), Step::End));
}

// =============================================================================
// end to end
// =============================================================================

async fn spawn_server(registry: Registry) -> SocketAddr {
    let listener = crate::routes::bind(0).await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(crate::routes::serve(listener, registry, std::future::pending()));
    addr
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/"))
        .await
        .expect("connect");
    client
}

async fn next_message(client: &mut Client) -> WsMessage {
    timeout(Duration::from_secs(2), client.next())
        .await
        .expect("receive timed out")
        .expect("stream ended")
        .expect("receive failed")
}

async fn round_trip(client: &mut Client, body: &str) -> String {
    client.send(WsMessage::text(body.to_owned())).await.expect("send");
    match next_message(client).await {
        WsMessage::Text(reply) => reply.as_str().to_owned(),
        other => panic!("expected text reply, got {other:?}"),
    }
}

#[tokio::test]
async fn call_over_the_wire() {
    let addr = spawn_server(sample_registry()).await;
    let mut client = connect(addr).await;

    assert_eq!(round_trip(&mut client, ADD_TWO).await, r#"{"error":"","result":7}"#);
}

#[tokio::test]
async fn session_survives_error_replies() {
    let addr = spawn_server(sample_registry()).await;
    let mut client = connect(addr).await;

    let ghost = round_trip(&mut client, r#"{"obj":"ghost","method":"Print","args":[]}"#).await;
    assert_eq!(ghost, r#"{"error":"Requested object is not registered.","result":null}"#);

    let malformed = round_trip(&mut client, "[1,2,3]").await;
    assert!(malformed.contains(envelope::MALFORMED_REQUEST));

    assert_eq!(round_trip(&mut client, ADD_TWO).await, r#"{"error":"","result":7}"#);
}

#[tokio::test]
async fn any_path_upgrades() {
    let addr = spawn_server(sample_registry()).await;
    let (mut client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/some/nested/path"))
        .await
        .expect("connect");

    assert_eq!(round_trip(&mut client, ADD_TWO).await, r#"{"error":"","result":7}"#);
}

#[tokio::test]
async fn oversize_message_closes_without_reply() {
    let addr = spawn_server(sample_registry()).await;
    let mut client = connect(addr).await;

    client
        .send(WsMessage::text("x".repeat(MAX_MESSAGE_SIZE + 1)))
        .await
        .expect("send");

    match next_message(&mut client).await {
        WsMessage::Close(Some(frame)) => {
            assert_eq!(frame.code, CloseCode::Size);
            assert_eq!(frame.reason.as_str(), MESSAGE_TOO_BIG_REASON);
        }
        other => panic!("expected close frame, got {other:?}"),
    }
}

#[tokio::test]
async fn message_under_read_bound_still_gets_size_close() {
    let addr = spawn_server(sample_registry()).await;
    let mut client = connect(addr).await;

    client
        .send(WsMessage::text("x".repeat(MAX_READ_SIZE / 2)))
        .await
        .expect("send");

    match next_message(&mut client).await {
        WsMessage::Close(Some(frame)) => assert_eq!(frame.code, CloseCode::Size),
        other => panic!("expected close frame, got {other:?}"),
    }
}

#[tokio::test]
async fn message_over_read_bound_is_cut_off() {
    let addr = spawn_server(sample_registry()).await;
    let mut client = connect(addr).await;

    // The server stops reading at the frame header, so the write may fail part way.
    let huge = "x".repeat(8 * 1024 * 1024);
    let _ = timeout(Duration::from_secs(2), client.send(WsMessage::text(huge))).await;

    let ended = timeout(Duration::from_secs(2), client.next())
        .await
        .expect("session should end promptly");
    match ended {
        None | Some(Err(_) | Ok(WsMessage::Close(_))) => {}
        Some(Ok(other)) => panic!("expected the session to end, got {other:?}"),
    }

    // The listener keeps serving other peers.
    let mut fresh = connect(addr).await;
    assert_eq!(round_trip(&mut fresh, ADD_TWO).await, r#"{"error":"","result":7}"#);
}

#[tokio::test]
async fn sessions_are_independent() {
    let addr = spawn_server(sample_registry()).await;
    let mut first = connect(addr).await;
    let mut second = connect(addr).await;

    let add = |target: &str, n: i64| {
        format!(r#"{{"obj":"{target}","method":"AddAndPrint","args":[{n}]}}"#)
    };

    let (to_foo, to_bar) = (add("foo", 1), add("bar", 2));
    let (a, b) = tokio::join!(round_trip(&mut first, &to_foo), round_trip(&mut second, &to_bar));
    assert_eq!(a, r#"{"error":"","result":1}"#);
    assert_eq!(b, r#"{"error":"","result":2}"#);

    // Object state belongs to the registry, not to the connection.
    let from_second = round_trip(&mut second, &add("foo", 10)).await;
    assert_eq!(from_second, r#"{"error":"","result":11}"#);
}
