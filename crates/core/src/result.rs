//! Result type definition and extension traits for Railway-Oriented Programming.
//!
//! Provides combinators that avoid unwrap/expect/panic, including the
//! "log and carry on" handling used for teardown failures.

use crate::error::Error;

/// The standard Result type for ferry operations.
///
/// # Examples
///
/// ```ignore
/// fn capacity() -> Result<usize> {
///     let config = SimulationConfig::from_file("ferry.toml")?;
///     Ok(config.capacity())
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait providing logging combinators for Results.
pub trait ResultExt<T> {
    /// Convert a Result to an Option, logging the error if present.
    fn into_option_logged(self) -> Option<T>;

    /// Inspect the error without consuming the Result.
    #[must_use]
    fn inspect_error<F: FnOnce(&Error)>(self, f: F) -> Self;
}

impl<T> ResultExt<T> for Result<T> {
    fn into_option_logged(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) if e.is_fatal() => {
                tracing::error!("Operation failed: {}", e);
                None
            }
            Err(e) => {
                tracing::warn!("Ignoring non-fatal failure: {}", e);
                None
            }
        }
    }

    fn inspect_error<F: FnOnce(&Error)>(self, f: F) -> Self {
        if let Err(ref e) = self {
            f(e);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_into_option_ok() {
        let result: Result<i32> = Ok(42);
        assert_eq!(result.into_option_logged(), Some(42));
    }

    #[test]
    fn test_result_into_option_teardown_err() {
        let result: Result<i32> = Err(Error::teardown_failed("gate", "poisoned"));
        assert_eq!(result.into_option_logged(), None);
    }

    #[test]
    fn test_inspect_error_sees_error() {
        let mut seen = false;
        let result: Result<i32> = Err(Error::invalid_config("capacity", "zero"));
        let _ = result.inspect_error(|_| seen = true);
        assert!(seen);
    }
}
