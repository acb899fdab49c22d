//! Helpers for threading [`Outcome`] through async record operations.

use asupersync::Outcome;

use crate::error::{Error, Result};

/// Unwrap `Outcome::Ok`, returning any other outcome from the enclosing function.
///
/// The `?` operator does not apply to `Outcome`; this is the four-arm match
/// every async path in the workspace would otherwise repeat.
#[macro_export]
macro_rules! try_outcome {
    ($expr:expr) => {
        match $expr {
            $crate::Outcome::Ok(value) => value,
            $crate::Outcome::Err(e) => return $crate::Outcome::Err(e),
            $crate::Outcome::Cancelled(reason) => return $crate::Outcome::Cancelled(reason),
            $crate::Outcome::Panicked(payload) => return $crate::Outcome::Panicked(payload),
        }
    };
}

/// Lift a synchronous `Result` into an `Outcome`.
pub fn into_outcome<T>(result: Result<T>) -> Outcome<T, Error> {
    match result {
        Ok(value) => Outcome::Ok(value),
        Err(e) => Outcome::Err(e),
    }
}
