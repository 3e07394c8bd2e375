//! Remote objects and their method tables.
//!
//! DESIGN
//! ======
//! A [`RemoteObject`] pairs an application instance (`Arc<T>`) with a table
//! mapping method names to typed decode-and-invoke closures. The table is
//! built once, at registration time, from ordinary Rust functions:
//!
//! ```ignore
//! RemoteObject::builder(calc)
//!     .method("Add", Calculator::add)           // fn(&Calculator, i64, i64) -> i64
//!     .try_method("Divide", Calculator::divide) // fn(&Calculator, i64, i64) -> Result<i64, E>
//!     .build()
//! ```
//!
//! Each entry knows its parameter count up front, so the dispatcher can reject
//! a wrong argument count before any decoding happens. Arguments are decoded
//! positionally with `serde`, driven by the parameter types of the function.
//!
//! Failures inside an entry (decode, `Err` return, panic, result encoding) are
//! reported as [`InvokeError`] and never unwind past [`MethodEntry::invoke`].

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// ERROR TYPE
// =============================================================================

/// Why a method entry failed to produce a value.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("argument {index} could not be decoded: {source}")]
    Decode {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("method returned an error: {0}")]
    Raised(String),
    #[error("method panicked: {0}")]
    Panicked(String),
    #[error("return value could not be encoded: {0}")]
    Encode(#[source] serde_json::Error),
}

// =============================================================================
// TYPED METHODS
// =============================================================================

/// A function callable on `&T` with positional JSON arguments.
///
/// Implemented for every `Fn(&T, A1, .., An) -> R` (up to six parameters)
/// whose parameters implement `DeserializeOwned`. `Args` is the parameter
/// tuple and only exists to keep the implementations apart.
pub trait Method<T, Args, R>: Send + Sync + 'static {
    /// Declared parameter count, excluding the receiver.
    const ARITY: usize;

    /// Decode `args` and call the function.
    ///
    /// # Errors
    ///
    /// Returns [`InvokeError::Decode`] if an argument does not fit its parameter type.
    fn invoke(&self, target: &T, args: &[Value]) -> Result<R, InvokeError>;
}

/// Missing trailing arguments decode from `null`, which suits `Option` parameters.
fn decode_arg<A: DeserializeOwned>(index: usize, value: Option<&Value>) -> Result<A, InvokeError> {
    let decoded: Result<A, _> = Deserialize::deserialize(value.unwrap_or(&Value::Null));
    decoded.map_err(|source| InvokeError::Decode { index, source })
}

macro_rules! impl_method {
    ($($arg:ident),*) => {
        impl<T, F, R, $($arg,)*> Method<T, ($($arg,)*), R> for F
        where
            F: Fn(&T, $($arg),*) -> R + Send + Sync + 'static,
            $($arg: DeserializeOwned,)*
        {
            const ARITY: usize = <[&str]>::len(&[$(stringify!($arg)),*]);

            #[allow(non_snake_case, unused_mut, unused_variables, unused_assignments)]
            fn invoke(&self, target: &T, args: &[Value]) -> Result<R, InvokeError> {
                let mut index = 0;
                $(
                    let $arg = decode_arg::<$arg>(index, args.get(index))?;
                    index += 1;
                )*
                Ok(self(target, $($arg),*))
            }
        }
    };
}

impl_method!();
impl_method!(A1);
impl_method!(A1, A2);
impl_method!(A1, A2, A3);
impl_method!(A1, A2, A3, A4);
impl_method!(A1, A2, A3, A4, A5);
impl_method!(A1, A2, A3, A4, A5, A6);

// =============================================================================
// METHOD ENTRY
// =============================================================================

type BoxedCall = Box<dyn Fn(&[Value]) -> Result<Option<Value>, InvokeError> + Send + Sync>;

/// One row of a method table: a parameter count and a type-erased call.
pub struct MethodEntry {
    arity: usize,
    call: BoxedCall,
}

impl MethodEntry {
    #[must_use]
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Run the method. `Ok(None)` means it produced no value (unit or `null`).
    ///
    /// # Errors
    ///
    /// Returns an [`InvokeError`] for any decode, method, panic, or encode failure.
    pub fn invoke(&self, args: &[Value]) -> Result<Option<Value>, InvokeError> {
        match catch_unwind(AssertUnwindSafe(|| (self.call)(args))) {
            Ok(outcome) => outcome,
            Err(payload) => Err(InvokeError::Panicked(panic_message(payload.as_ref()))),
        }
    }
}

impl fmt::Debug for MethodEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodEntry").field("arity", &self.arity).finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        return (*text).to_owned();
    }
    if let Some(text) = payload.downcast_ref::<String>() {
        return text.clone();
    }
    "non-string panic payload".to_owned()
}

fn encode_return<R: Serialize>(value: &R) -> Result<Option<Value>, InvokeError> {
    let value = serde_json::to_value(value).map_err(InvokeError::Encode)?;
    Ok((!value.is_null()).then_some(value))
}

// =============================================================================
// REMOTE OBJECT
// =============================================================================

/// An application instance exposed to remote callers through its method table.
pub struct RemoteObject {
    instance: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
    methods: HashMap<String, MethodEntry>,
}

impl RemoteObject {
    /// Start a method table for `instance`.
    pub fn builder<T>(instance: Arc<T>) -> RemoteObjectBuilder<T>
    where
        T: Send + Sync + 'static,
    {
        RemoteObjectBuilder { instance, methods: HashMap::new() }
    }

    /// True if this object wraps the same allocation as `instance`.
    #[must_use]
    pub fn is_instance<U: ?Sized>(&self, instance: &Arc<U>) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.instance), Arc::as_ptr(instance))
    }

    #[must_use]
    pub fn method(&self, name: &str) -> Option<&MethodEntry> {
        self.methods.get(name)
    }

    /// Exposed method names, sorted.
    #[must_use]
    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for RemoteObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteObject")
            .field("type_name", &self.type_name)
            .field("methods", &self.method_names())
            .finish_non_exhaustive()
    }
}

/// Builder returned by [`RemoteObject::builder`].
pub struct RemoteObjectBuilder<T> {
    instance: Arc<T>,
    methods: HashMap<String, MethodEntry>,
}

impl<T> RemoteObjectBuilder<T>
where
    T: Send + Sync + 'static,
{
    /// Expose an infallible method. A later entry with the same name replaces this one.
    #[must_use]
    pub fn method<M, A, R>(self, name: impl Into<String>, method: M) -> Self
    where
        M: Method<T, A, R>,
        A: 'static,
        R: Serialize + 'static,
    {
        let instance = Arc::clone(&self.instance);
        let call = move |args: &[Value]| {
            let value = method.invoke(&instance, args)?;
            encode_return(&value)
        };
        self.insert(name.into(), M::ARITY, Box::new(call))
    }

    /// Expose a method returning `Result`. An `Err` becomes [`InvokeError::Raised`].
    #[must_use]
    pub fn try_method<M, A, R, E>(self, name: impl Into<String>, method: M) -> Self
    where
        M: Method<T, A, Result<R, E>>,
        A: 'static,
        R: Serialize + 'static,
        E: fmt::Display + 'static,
    {
        let instance = Arc::clone(&self.instance);
        let call = move |args: &[Value]| {
            let value = method
                .invoke(&instance, args)?
                .map_err(|e| InvokeError::Raised(e.to_string()))?;
            encode_return(&value)
        };
        self.insert(name.into(), M::ARITY, Box::new(call))
    }

    #[must_use]
    pub fn build(self) -> RemoteObject {
        RemoteObject {
            instance: self.instance,
            type_name: std::any::type_name::<T>(),
            methods: self.methods,
        }
    }

    fn insert(mut self, name: String, arity: usize, call: BoxedCall) -> Self {
        self.methods.insert(name, MethodEntry { arity, call });
        self
    }
}

#[cfg(test)]
#[path = "object_test.rs"]
mod tests;
