//! Turns a call envelope into a result envelope.
//!
//! DESIGN
//! ======
//! Resolution runs in a fixed order: target object, method name, argument
//! count, then decode-and-invoke. The first failure wins and nothing after it
//! runs, so an unknown target or a wrong argument count never reaches the
//! application object.
//!
//! TRUST BOUNDARY
//! ==============
//! The remote peer only ever sees the fixed texts from the `envelope` crate.
//! Invocation failure detail (decode errors, `Err` values, panic messages)
//! is logged here and dropped from the reply.

use serde_json::Value;
use tracing::{error, warn};

use envelope::{CallEnvelope, ResultEnvelope};

use crate::object::InvokeError;
use crate::registry::Registry;

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code attached to structured log lines.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;
}

/// Why a call could not produce a value.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("object `{0}` is not registered")]
    ObjectNotRegistered(String),
    #[error("object `{target}` has no method `{method}`")]
    MethodNotFound { target: String, method: String },
    #[error("method `{method}` takes {expected} argument(s), got {actual}")]
    ArgumentCountMismatch { method: String, expected: usize, actual: usize },
    #[error("invocation of `{method}` failed: {source}")]
    InvocationFailure {
        method: String,
        #[source]
        source: InvokeError,
    },
}

impl DispatchError {
    /// The only text of this error allowed onto the wire.
    #[must_use]
    pub fn wire_message(&self) -> &'static str {
        match self {
            Self::ObjectNotRegistered(_) => envelope::OBJECT_NOT_REGISTERED,
            Self::MethodNotFound { .. } => envelope::METHOD_NOT_FOUND,
            Self::ArgumentCountMismatch { .. } => envelope::ARGUMENT_COUNT_MISMATCH,
            Self::InvocationFailure { .. } => envelope::INVOCATION_FAILED,
        }
    }
}

impl ErrorCode for DispatchError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ObjectNotRegistered(_) => "E_OBJECT_NOT_REGISTERED",
            Self::MethodNotFound { .. } => "E_METHOD_NOT_FOUND",
            Self::ArgumentCountMismatch { .. } => "E_ARGUMENT_COUNT",
            Self::InvocationFailure { .. } => "E_INVOCATION",
        }
    }
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Run one call against `registry` and package the outcome for the wire.
///
/// Never fails: every [`DispatchError`] becomes an error envelope.
#[must_use]
pub fn invoke(registry: &Registry, call: &CallEnvelope) -> ResultEnvelope {
    match try_invoke(registry, call) {
        Ok(result) => ResultEnvelope::success(result),
        Err(err) => {
            if matches!(err, DispatchError::InvocationFailure { .. }) {
                error!(code = err.error_code(), object = %call.target, error = %err, "dispatch: call failed");
            } else {
                warn!(code = err.error_code(), object = %call.target, error = %err, "dispatch: call rejected");
            }
            ResultEnvelope::failure(err.wire_message())
        }
    }
}

/// Resolve and run one call, keeping the typed failure.
///
/// # Errors
///
/// Returns the first [`DispatchError`] hit while resolving or invoking.
pub fn try_invoke(registry: &Registry, call: &CallEnvelope) -> Result<Option<Value>, DispatchError> {
    let object = registry
        .resolve(&call.target)
        .map_err(|_| DispatchError::ObjectNotRegistered(call.target.clone()))?;

    let method = object.method(&call.method).ok_or_else(|| DispatchError::MethodNotFound {
        target: call.target.clone(),
        method: call.method.clone(),
    })?;

    if call.args.len() != method.arity() {
        return Err(DispatchError::ArgumentCountMismatch {
            method: call.method.clone(),
            expected: method.arity(),
            actual: call.args.len(),
        });
    }

    method
        .invoke(&call.args)
        .map_err(|source| DispatchError::InvocationFailure { method: call.method.clone(), source })
}

#[cfg(test)]
#[path = "dispatch_test.rs"]
mod tests;
