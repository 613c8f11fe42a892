//! Bounded transaction retry shared by the store runners.

use std::error::Error as StdError;

use tracing::warn;

use crate::error::{CollError, CollResult};

/// Renders an error with its source chain on one line.
pub(crate) fn describe(err: &CollError) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

/// Calls `attempt` until it succeeds, fails with a non-retryable error, or
/// has been called `attempts` times.
///
/// `attempt` receives the 1-based attempt number. When every attempt fails
/// with a retryable error the result is
/// [`CollError::TransactionRetriesExhausted`] listing each failure in order.
pub fn retry_transaction<T, F>(attempts: usize, mut attempt: F) -> CollResult<T>
where
    F: FnMut(usize) -> CollResult<T>,
{
    let mut failures = Vec::with_capacity(attempts);
    for number in 1..=attempts {
        match attempt(number) {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() => {
                let text = describe(&err);
                warn!(attempt = number, of = attempts, error = %text, "transaction attempt failed");
                failures.push(text);
            }
            Err(err) => return Err(err),
        }
    }
    Err(CollError::TransactionRetriesExhausted { attempts: failures })
}
