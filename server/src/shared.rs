//! Sample shared objects exposed by the `netcall-server` binary.
//!
//! `SharedObject` keeps a running total and mirrors the method names peers
//! already call (`Print`, `AddAndPrint`, `AddTwo`). `Calculator` is a
//! stateless `calc` target taking plain numbers.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::object::RemoteObject;
use crate::registry::{Registry, RegistryError};

#[derive(Debug, thiserror::Error)]
pub enum ArithmeticError {
    #[error("{a} + {b} overflows")]
    Overflow { a: i64, b: i64 },
    #[error("division of {0} by zero")]
    DivideByZero(i64),
}

/// Operand pair sent as `{"A": .., "B": ..}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddNumbers {
    #[serde(rename = "A")]
    pub a: i64,
    #[serde(rename = "B")]
    pub b: i64,
}

// =============================================================================
// SHARED OBJECT
// =============================================================================

#[derive(Debug, Default)]
pub struct SharedObject {
    number: AtomicI64,
}

impl SharedObject {
    #[allow(clippy::unused_self)]
    pub fn print(&self, text: String) {
        info!(%text, "shared: print");
    }

    /// Add `n` to the running total and return the new total.
    pub fn add_and_print(&self, n: i64) -> i64 {
        let total = self.number.fetch_add(n, Ordering::SeqCst).wrapping_add(n);
        info!(total, "shared: add and print");
        total
    }

    /// # Errors
    ///
    /// Returns [`ArithmeticError::Overflow`] if the sum does not fit in `i64`.
    pub fn add_two(&self, v: AddNumbers) -> Result<i64, ArithmeticError> {
        let result = v.a.checked_add(v.b).ok_or(ArithmeticError::Overflow { a: v.a, b: v.b })?;
        info!(a = v.a, b = v.b, result, "shared: calculated");
        Ok(result)
    }

    #[must_use]
    pub fn total(&self) -> i64 {
        self.number.load(Ordering::SeqCst)
    }

    /// Method table for `instance`.
    #[must_use]
    pub fn remote(instance: Arc<Self>) -> RemoteObject {
        RemoteObject::builder(instance)
            .method("Print", Self::print)
            .method("AddAndPrint", Self::add_and_print)
            .try_method("AddTwo", Self::add_two)
            .build()
    }
}

// =============================================================================
// CALCULATOR
// =============================================================================

#[derive(Debug, Default)]
pub struct Calculator;

#[allow(clippy::unused_self)]
impl Calculator {
    /// # Errors
    ///
    /// Returns [`ArithmeticError::Overflow`] if the sum does not fit in `i64`.
    pub fn add_two(&self, a: i64, b: i64) -> Result<i64, ArithmeticError> {
        a.checked_add(b).ok_or(ArithmeticError::Overflow { a, b })
    }

    /// # Errors
    ///
    /// Returns [`ArithmeticError::DivideByZero`] when `b` is zero.
    pub fn divide(&self, a: i64, b: i64) -> Result<i64, ArithmeticError> {
        if b == 0 {
            return Err(ArithmeticError::DivideByZero(a));
        }
        Ok(a.wrapping_div(b))
    }

    #[must_use]
    pub fn remote(instance: Arc<Self>) -> RemoteObject {
        RemoteObject::builder(instance)
            .try_method("AddTwo", Self::add_two)
            .try_method("Divide", Self::divide)
            .build()
    }
}

// =============================================================================
// REGISTRATION
// =============================================================================

/// Register `foo`, `bar` (two `SharedObject`s) and `calc` into `registry`.
///
/// # Errors
///
/// Returns [`RegistryError::DuplicateIdentifier`] if any of the identifiers is taken.
pub fn register_samples(registry: &Registry) -> Result<(), RegistryError> {
    registry.register("foo", SharedObject::remote(Arc::new(SharedObject::default())))?;
    registry.register("bar", SharedObject::remote(Arc::new(SharedObject::default())))?;
    registry.register("calc", Calculator::remote(Arc::new(Calculator)))?;
    Ok(())
}

#[cfg(test)]
#[path = "shared_test.rs"]
mod tests;
