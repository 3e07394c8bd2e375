//! Client side of the call protocol.
//!
//! A [`Caller`] owns at most one outgoing WebSocket connection. Each call
//! encodes a call envelope, sends it, and waits for exactly one reply. Calls
//! take `&mut self`, so a connection never has more than one call in flight;
//! the protocol carries no correlation id to tell overlapping replies apart.
//!
//! There is no timeout. Wrap a call in `tokio::time::timeout` to bound it.

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};

use envelope::{CallEnvelope, CodecError, ResultEnvelope};

type Stream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Error type for caller operations.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// `connect` was issued while a connection is open.
    #[error("caller is already connected")]
    AlreadyConnected,
    /// A call was issued without an open connection.
    #[error("caller is not connected")]
    NotConnected,
    /// The WebSocket handshake failed.
    #[error("websocket connect failed: {0}")]
    Connect(Box<tokio_tungstenite::tungstenite::Error>),
    /// Sending or receiving failed after the connection was established.
    #[error("websocket transport failed: {0}")]
    Transport(Box<tokio_tungstenite::tungstenite::Error>),
    /// The server closed the connection before replying.
    #[error("connection closed by server (code {code:?}): {reason}")]
    Closed { code: Option<u16>, reason: String },
    /// An envelope could not be encoded or the reply could not be decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// The server replied with a non-empty `error`.
    #[error("remote error: {0}")]
    Remote(String),
    /// A binary reply was not valid UTF-8.
    #[error("reply is not valid utf-8: {0}")]
    InvalidUtf8(#[source] std::string::FromUtf8Error),
    /// The reply value does not match the requested result type.
    #[error("result does not match the expected type: {0}")]
    InvalidResult(#[source] serde_json::Error),
    /// An argument could not be converted to JSON.
    #[error("argument could not be serialized: {0}")]
    InvalidArgument(#[source] serde_json::Error),
}

// =============================================================================
// ARGUMENTS
// =============================================================================

/// Positional call arguments.
///
/// Implemented for tuples of up to six `Serialize` values and for a
/// prebuilt `Vec<serde_json::Value>`.
pub trait IntoArgs {
    /// Convert into the envelope's positional argument list.
    ///
    /// # Errors
    ///
    /// Returns the serializer error for the first argument that fails.
    fn into_args(self) -> Result<Vec<Value>, serde_json::Error>;
}

impl IntoArgs for Vec<Value> {
    fn into_args(self) -> Result<Vec<Value>, serde_json::Error> {
        Ok(self)
    }
}

macro_rules! impl_into_args {
    ($($arg:ident),*) => {
        impl<$($arg: Serialize),*> IntoArgs for ($($arg,)*) {
            #[allow(non_snake_case)]
            fn into_args(self) -> Result<Vec<Value>, serde_json::Error> {
                let ($($arg,)*) = self;
                Ok(vec![$(serde_json::to_value($arg)?),*])
            }
        }
    };
}

impl_into_args!();
impl_into_args!(A1);
impl_into_args!(A1, A2);
impl_into_args!(A1, A2, A3);
impl_into_args!(A1, A2, A3, A4);
impl_into_args!(A1, A2, A3, A4, A5);
impl_into_args!(A1, A2, A3, A4, A5, A6);

// =============================================================================
// CALLER
// =============================================================================

/// One outgoing connection to a call server.
#[derive(Default)]
pub struct Caller {
    stream: Option<Stream>,
}

impl std::fmt::Debug for Caller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Caller").field("connected", &self.is_connected()).finish()
    }
}

impl Caller {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Open the connection to `url` (for example `ws://127.0.0.1:5555`).
    ///
    /// # Errors
    ///
    /// Returns [`CallError::AlreadyConnected`] if a connection is open, or
    /// [`CallError::Connect`] if the handshake fails.
    pub async fn connect(&mut self, url: &str) -> Result<(), CallError> {
        if self.stream.is_some() {
            return Err(CallError::AlreadyConnected);
        }
        let (stream, _) = connect_async(url)
            .await
            .map_err(|e| CallError::Connect(Box::new(e)))?;
        debug!(url, "caller: connected");
        self.stream = Some(stream);
        Ok(())
    }

    /// Invoke `method` on the object registered as `target`.
    ///
    /// Returns `Ok(None)` when the method produced no value and `Ok(Some(_))`
    /// with the decoded value otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::Remote`] with the server's text when the reply
    /// carries an error, [`CallError::InvalidResult`] when the value does not
    /// decode as `R`, or a connection error. A close or transport fault leaves
    /// the caller disconnected.
    pub async fn call<R>(
        &mut self,
        target: &str,
        method: &str,
        args: impl IntoArgs,
    ) -> Result<Option<R>, CallError>
    where
        R: DeserializeOwned,
    {
        let args = args.into_args().map_err(CallError::InvalidArgument)?;
        let reply = self.call_raw(&CallEnvelope::new(target, method, args)).await?;
        match reply.into_outcome() {
            Err(message) => Err(CallError::Remote(message)),
            Ok(None) => Ok(None),
            Ok(Some(value)) => serde_json::from_value(value)
                .map(Some)
                .map_err(CallError::InvalidResult),
        }
    }

    /// Send one call envelope and return the untyped reply.
    ///
    /// # Errors
    ///
    /// Returns codec or connection errors. A remote error is not an error
    /// here; inspect the returned envelope.
    pub async fn call_raw(&mut self, call: &CallEnvelope) -> Result<ResultEnvelope, CallError> {
        let request = envelope::encode_call(call)?;
        debug!(object = %call.target, method = %call.method, "caller: send call");
        let reply = self.exchange(request).await?;
        Ok(envelope::decode_result(&reply)?)
    }

    /// Send a normal close and release the connection. No-op when disconnected.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::Transport`] if the close handshake fails; the
    /// connection is released either way.
    pub async fn close(&mut self) -> Result<(), CallError> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        debug!("caller: closing");
        stream
            .close(None)
            .await
            .map_err(|e| CallError::Transport(Box::new(e)))
    }

    async fn exchange(&mut self, request: String) -> Result<String, CallError> {
        let stream = self.stream.as_mut().ok_or(CallError::NotConnected)?;
        let outcome = round_trip(stream, request).await;
        if matches!(outcome, Err(CallError::Transport(_) | CallError::Closed { .. })) {
            self.stream = None;
        }
        outcome
    }
}

async fn round_trip(stream: &mut Stream, request: String) -> Result<String, CallError> {
    trace!(data = %request, "caller: send (raw)");
    stream
        .send(Message::text(request))
        .await
        .map_err(|e| CallError::Transport(Box::new(e)))?;

    loop {
        let Some(msg) = stream.next().await else {
            return Err(CallError::Closed { code: None, reason: String::new() });
        };
        match msg.map_err(|e| CallError::Transport(Box::new(e)))? {
            Message::Text(text) => {
                trace!(data = text.as_str(), "caller: recv (raw)");
                return Ok(text.as_str().to_owned());
            }
            Message::Binary(bytes) => {
                return String::from_utf8(bytes.to_vec()).map_err(CallError::InvalidUtf8);
            }
            Message::Close(frame) => {
                let (code, reason) = frame
                    .map(|f| (Some(u16::from(f.code)), f.reason.as_str().to_owned()))
                    .unwrap_or_default();
                debug!(?code, %reason, "caller: closed by server");
                return Err(CallError::Closed { code, reason });
            }
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
        }
    }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
