//! Shared envelope model and JSON codec for the call protocol.
//!
//! This crate owns the wire representation used by both `server` and
//! `caller`. Argument and result values stay opaque (`serde_json::Value`);
//! each side decodes them into concrete types only where the type is known
//! (the server against a method's parameters, the caller against `T`).
//!
//! Two message shapes exist, both carried as one WebSocket text message:
//!
//! ```text
//! request:  {"obj": "<target>", "method": "<name>", "args": [<value>, ...]}
//! response: {"error": "<text>" | null, "result": <value> | null}
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// =============================================================================
// PROTOCOL CONSTANTS
// =============================================================================

/// Largest inbound message, in bytes, a server session accepts.
pub const MAX_MESSAGE_SIZE: usize = 1024;

/// Reply text when the call target is not in the registry.
pub const OBJECT_NOT_REGISTERED: &str = "Requested object is not registered.";

/// Reply text when the target has no method with the requested name.
pub const METHOD_NOT_FOUND: &str = "Requested method of object does not exist.";

/// Reply text when the argument count differs from the method's parameter count.
pub const ARGUMENT_COUNT_MISMATCH: &str = "Argument count does not match the requested method.";

/// Reply text for any failure while decoding arguments or running the method.
/// The underlying detail never leaves the server.
pub const INVOCATION_FAILED: &str = "The called method resulted in an exception.";

/// Reply text when a request body is not a valid call envelope.
pub const MALFORMED_REQUEST: &str = "Request could not be decoded.";

// =============================================================================
// ERRORS
// =============================================================================

/// Error returned by the encode/decode functions.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A value could not be rendered as JSON.
    #[error("failed to encode envelope: {0}")]
    Encode(#[source] serde_json::Error),
    /// The text is not valid JSON or does not match the envelope shape.
    #[error("failed to decode envelope: {0}")]
    Decode(#[source] serde_json::Error),
}

// =============================================================================
// ENVELOPES
// =============================================================================

/// A request to invoke `method` on the object registered as `target`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallEnvelope {
    /// Identifier the target object was registered under.
    #[serde(rename = "obj")]
    pub target: String,
    /// Method name, matched exactly.
    pub method: String,
    /// Positional arguments, still encoded.
    #[serde(default)]
    pub args: Vec<Value>,
}

impl CallEnvelope {
    pub fn new(target: impl Into<String>, method: impl Into<String>, args: Vec<Value>) -> Self {
        Self { target: target.into(), method: method.into(), args }
    }
}

/// Outcome of one call.
///
/// A non-empty `error` wins: receivers ignore `result` whenever `error` is set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    /// Failure text, empty on success. `null` on the wire decodes as empty.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub error: String,
    /// Encoded return value; `None` when the method produced nothing.
    #[serde(default)]
    pub result: Option<Value>,
}

impl ResultEnvelope {
    /// Successful outcome. A JSON `null` result is normalized to "absent".
    #[must_use]
    pub fn success(result: Option<Value>) -> Self {
        Self { error: String::new(), result: result.filter(|v| !v.is_null()) }
    }

    /// Failed outcome carrying only `message`.
    pub fn failure(message: impl Into<String>) -> Self {
        Self { error: message.into(), result: None }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }

    /// Collapse into `Ok(result)` or `Err(error)`, applying the error-wins rule.
    ///
    /// # Errors
    ///
    /// Returns the remote error text when `error` is non-empty.
    pub fn into_outcome(self) -> Result<Option<Value>, String> {
        if self.is_error() {
            return Err(self.error);
        }
        Ok(self.result.filter(|v| !v.is_null()))
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// =============================================================================
// CODEC
// =============================================================================

/// Encode a call envelope as JSON text.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if an argument value cannot be serialized.
pub fn encode_call(call: &CallEnvelope) -> Result<String, CodecError> {
    serde_json::to_string(call).map_err(CodecError::Encode)
}

/// Decode JSON text into a call envelope.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] for malformed JSON or a missing `obj`/`method`.
pub fn decode_call(text: &str) -> Result<CallEnvelope, CodecError> {
    serde_json::from_str(text).map_err(CodecError::Decode)
}

/// Encode a result envelope as JSON text.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if the result value cannot be serialized.
pub fn encode_result(result: &ResultEnvelope) -> Result<String, CodecError> {
    serde_json::to_string(result).map_err(CodecError::Encode)
}

/// Decode JSON text into a result envelope.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] for malformed JSON.
pub fn decode_result(text: &str) -> Result<ResultEnvelope, CodecError> {
    serde_json::from_str(text).map_err(CodecError::Decode)
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
