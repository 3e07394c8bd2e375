//! WebSocket handler: one call session per connection.
//!
//! DESIGN
//! ======
//! On upgrade, generates a session ID and enters a strictly sequential loop:
//! receive one message, dispatch it, send one reply, and only then receive
//! again. There is no pipelining within a connection.
//!
//! `process_message` is the pure part: it turns one inbound message into a
//! `Step` without touching the socket, so tests can drive the protocol rules
//! (size limit, malformed bodies, dispatch) directly.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → `ws: client connected`
//! 2. Text/binary message → size check → decode → dispatch → reply
//! 3. Oversize message → close 1009 with a fixed reason, no reply
//!    (above `MAX_READ_SIZE` the read fails first and the socket is dropped)
//! 4. Peer close, end of stream, or I/O fault → `ws: client disconnected`

use axum::extract::State;
use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code};
use axum::response::Response;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use envelope::{MAX_MESSAGE_SIZE, ResultEnvelope};

use crate::dispatch;
use crate::registry::Registry;

/// Close reason sent with status 1009.
pub const MESSAGE_TOO_BIG_REASON: &str = "Message frame exceeded 1024 bytes.";

/// Transport read bound. Frames or messages above it fail while the frame
/// header is parsed and the connection is dropped unread. Messages between
/// [`MAX_MESSAGE_SIZE`] and this bound still get the 1009 close.
pub const MAX_READ_SIZE: usize = 16 * 1024;

// =============================================================================
// STEP
// =============================================================================

/// What the session does after one inbound message.
#[derive(Debug)]
enum Step {
    /// Send this encoded result envelope, then read again.
    Reply(String),
    /// Send this close frame and end the session.
    Close(CloseFrame),
    /// Nothing to send; read again.
    Skip,
    /// The peer closed; end the session.
    End,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(registry): State<Registry>, ws: WebSocketUpgrade) -> Response {
    ws.max_frame_size(MAX_READ_SIZE)
        .max_message_size(MAX_READ_SIZE)
        .on_upgrade(move |socket| run_ws(socket, registry))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, registry: Registry) {
    let session_id = Uuid::new_v4();
    info!(%session_id, "ws: client connected");

    loop {
        let Some(msg) = socket.recv().await else { break };
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                warn!(%session_id, error = %e, "ws: receive failed");
                break;
            }
        };

        match process_message(&registry, session_id, msg) {
            Step::Reply(text) => {
                trace!(%session_id, data = %text, "ws: send result (raw)");
                if let Err(e) = socket.send(Message::Text(text.into())).await {
                    warn!(%session_id, error = %e, "ws: send failed");
                    break;
                }
            }
            Step::Close(frame) => {
                if let Err(e) = socket.send(Message::Close(Some(frame))).await {
                    warn!(%session_id, error = %e, "ws: close failed");
                }
                break;
            }
            Step::Skip => {}
            Step::End => break,
        }
    }

    info!(%session_id, "ws: client disconnected");
}

// =============================================================================
// MESSAGE PROCESSING
// =============================================================================

fn process_message(registry: &Registry, session_id: Uuid, msg: Message) -> Step {
    match msg {
        Message::Text(text) => process_body(registry, session_id, text.as_str().as_bytes()),
        Message::Binary(bytes) => process_body(registry, session_id, &bytes),
        Message::Close(_) => Step::End,
        Message::Ping(_) | Message::Pong(_) => Step::Skip,
    }
}

/// Apply the size limit, decode one call envelope, dispatch it, encode the reply.
fn process_body(registry: &Registry, session_id: Uuid, body: &[u8]) -> Step {
    if body.len() > MAX_MESSAGE_SIZE {
        warn!(%session_id, size = body.len(), limit = MAX_MESSAGE_SIZE, "ws: message too big");
        return Step::Close(CloseFrame {
            code: close_code::SIZE,
            reason: Utf8Bytes::from_static(MESSAGE_TOO_BIG_REASON),
        });
    }

    let Ok(text) = std::str::from_utf8(body) else {
        warn!(%session_id, size = body.len(), "ws: request is not valid utf-8");
        return encode_reply(session_id, &ResultEnvelope::failure(envelope::MALFORMED_REQUEST));
    };
    trace!(%session_id, data = %text, "ws: recv request (raw)");

    let call = match envelope::decode_call(text) {
        Ok(call) => call,
        Err(e) => {
            warn!(%session_id, error = %e, "ws: invalid inbound request");
            return encode_reply(session_id, &ResultEnvelope::failure(envelope::MALFORMED_REQUEST));
        }
    };
    debug!(%session_id, object = %call.target, method = %call.method, args = ?call.args, "ws: recv request");

    let result = dispatch::invoke(registry, &call);
    debug!(%session_id, error = %result.error, result = ?result.result, "ws: send result");

    encode_reply(session_id, &result)
}

fn encode_reply(session_id: Uuid, result: &ResultEnvelope) -> Step {
    let encoded = envelope::encode_result(result).or_else(|e| {
        error!(%session_id, error = %e, "ws: failed to encode result");
        envelope::encode_result(&ResultEnvelope::failure(envelope::INVOCATION_FAILED))
    });
    match encoded {
        Ok(text) => Step::Reply(text),
        Err(_) => Step::End,
    }
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
