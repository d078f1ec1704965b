//! Deadline-bound retry primitive.

use std::future::Future;
use std::time::Duration;

use panel_core::{Error, Result};
use tokio::time::Instant;

/// Run `operation` until it succeeds or `timeout` has elapsed.
///
/// The operation is retried every `interval` with no cap on attempts other
/// than the deadline. Once the deadline has passed, the next failure is
/// returned as [`Error::Timeout`] carrying that failure's message. Each
/// attempt is itself bounded by the time left, so a call that never answers
/// cannot hold the wait past its deadline; the timeout then carries the
/// previous failure's message, if any.
///
/// Dropping the returned future stops further attempts; nothing is left
/// scheduled.
///
/// # Errors
///
/// Returns [`Error::Timeout`] when the deadline elapses without success.
pub async fn wait_for<T, F, Fut>(mut operation: F, interval: Duration, timeout: Duration) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let start = Instant::now();
    let mut attempt: u32 = 0;
    let mut last_error: Option<String> = None;

    loop {
        attempt += 1;
        let remaining = timeout.saturating_sub(start.elapsed());

        match tokio::time::timeout(remaining, operation()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => {
                if start.elapsed() > timeout {
                    tracing::debug!(attempt, "giving up after {timeout:?}: {e}");
                    return Err(Error::Timeout {
                        timeout,
                        last_error: e.to_string(),
                    });
                }
                tracing::trace!(attempt, "retrying in {interval:?}: {e}");
                last_error = Some(e.to_string());
                tokio::time::sleep(interval).await;
            }
            Err(_) => {
                tracing::debug!(attempt, "attempt still pending after {timeout:?}");
                return Err(Error::Timeout {
                    timeout,
                    last_error: last_error
                        .unwrap_or_else(|| format!("no response within {timeout:?}")),
                });
            }
        }
    }
}
