//! Fixed-delay retry for completion attempts.

use crate::error::CompletionError;
use std::future::Future;
use std::time::Duration;

/// The last error once the retry budget is spent, with the retries used.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryExhausted {
    pub error: CompletionError,
    pub retries: u32,
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// has been retried `max_retries` times.
///
/// `operation` receives the zero-based attempt number. `delay` is slept
/// between attempts.
pub async fn retry_with_delay<F, Fut, T>(
    max_retries: u32,
    delay: Duration,
    mut operation: F,
) -> Result<T, RetryExhausted>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, CompletionError>>,
{
    let mut attempt = 0;

    loop {
        match operation(attempt).await {
            Ok(output) => {
                if attempt > 0 {
                    log::info!(
                        "Completion succeeded on attempt {}/{}",
                        attempt + 1,
                        max_retries + 1
                    );
                }
                return Ok(output);
            }
            Err(e) if e.is_retryable() && attempt < max_retries => {
                log::warn!(
                    "Completion failed (attempt {}/{}): {}. Retrying in {:?}...",
                    attempt + 1,
                    max_retries + 1,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    log::error!("Completion failed after {} attempts: {}", attempt + 1, e);
                } else {
                    log::error!("Completion failed with non-retryable error: {}", e);
                }
                return Err(RetryExhausted {
                    error: e,
                    retries: attempt,
                });
            }
        }
    }
}
