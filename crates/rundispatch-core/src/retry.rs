//! Bounded polling until a listing becomes non-empty.
//!
//! Remote listings are eventually consistent: a run triggered a moment ago may
//! not be visible yet. [`retry_or_die`] absorbs that latency by re-invoking a
//! producer on a fixed interval until it yields something or the deadline
//! passes.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::error::{DispatchError, Result};

/// Pause between two unsuccessful producer invocations.
pub const RETRY_INTERVAL: Duration = Duration::from_millis(1000);

/// Invoke `producer` until it returns a non-empty sequence.
///
/// The deadline is measured from the first invocation and re-checked before
/// every invocation, so an always-empty producer fails after at least
/// `timeout` and at most `timeout + RETRY_INTERVAL`. Producer errors are
/// returned immediately without retrying.
pub async fn retry_or_die<T, F, Fut>(producer: F, timeout: Duration) -> Result<Vec<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    poll_until_non_empty(producer, timeout, RETRY_INTERVAL).await
}

pub(crate) async fn poll_until_non_empty<T, F, Fut>(
    mut producer: F,
    timeout: Duration,
    interval: Duration,
) -> Result<Vec<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    let start = Instant::now();
    let mut attempt: u32 = 0;

    while start.elapsed() < timeout {
        attempt += 1;
        let items = producer().await?;
        if !items.is_empty() {
            debug!(attempt, found = items.len(), "poll returned results");
            return Ok(items);
        }
        debug!(attempt, "poll returned nothing, retrying");
        sleep(interval).await;
    }

    Err(DispatchError::Timeout {
        timeout_ms: timeout.as_millis() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test(start_paused = true)]
    async fn test_first_non_empty_result_wins() {
        let start = Instant::now();
        let mut calls = 0;

        let result = retry_or_die(
            || {
                calls += 1;
                async { Ok(vec![7_u64, 3]) }
            },
            Duration::from_secs(10),
        )
        .await
        .expect("should succeed");

        assert_eq!(result, vec![7, 3]);
        assert_eq!(calls, 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_producer_error_is_not_retried() {
        let mut calls = 0;

        let err = retry_or_die::<u64, _, _>(
            || {
                calls += 1;
                async {
                    Err(DispatchError::Protocol {
                        operation: "list workflow runs",
                        expected: 200,
                        actual: 500,
                    })
                }
            },
            Duration::from_secs(10),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_content_changes_between_calls() {
        let mut calls = 0;

        let result = retry_or_die(
            || {
                calls += 1;
                let n = calls;
                async move {
                    if n < 3 {
                        Ok(Vec::new())
                    } else {
                        Ok(vec![format!("poll-{n}")])
                    }
                }
            },
            Duration::from_secs(10),
        )
        .await
        .expect("should succeed");

        assert_eq!(result, vec!["poll-3".to_string()]);
        assert_eq!(calls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_never_invokes_producer() {
        let mut calls = 0;

        let err = retry_or_die::<u64, _, _>(
            || {
                calls += 1;
                async { Ok(vec![1]) }
            },
            Duration::ZERO,
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(calls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_interval_is_respected() {
        let start = Instant::now();
        let mut calls = 0;

        let result = poll_until_non_empty(
            || {
                calls += 1;
                let n = calls;
                async move { Ok(if n == 2 { vec![n] } else { Vec::new() }) }
            },
            Duration::from_secs(60),
            Duration::from_secs(5),
        )
        .await
        .expect("should succeed");

        assert_eq!(result, vec![2]);
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }
}
