//! # Retry
//!
//! Runs a fallible async operation under an [`ExponentialBackoff`] policy.
//!
//! Only errors reporting [`Error::is_retryable`] are repeated. Cancellation
//! aborts both the in-flight attempt and any pending wait.

use super::backoff::ExponentialBackoff;
use crate::error::{Error, Operation, Result};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Retry `op` until it succeeds, fails permanently, or the policy runs out
///
/// `notify` observes every retryable failure together with the wait that
/// precedes the next attempt. On exhaustion the last error is returned.
pub async fn retry_notify<T, F, Fut, N>(
    mut policy: ExponentialBackoff,
    token: &CancellationToken,
    operation: Operation,
    resource: &str,
    mut op: F,
    mut notify: N,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
    N: FnMut(&Error, Duration),
{
    policy.reset();
    let mut attempt = 1;
    loop {
        let outcome = tokio::select! {
            biased;
            () = token.cancelled() => return Err(cancelled(operation, resource)),
            outcome = op(attempt) => outcome,
        };

        let err = match outcome {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) => err,
        };

        let Some(wait) = policy.next_backoff() else {
            return Err(err);
        };

        notify(&err, wait);
        warn!(
            resource = %resource,
            attempt,
            wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "Apply attempt failed, retrying"
        );

        tokio::select! {
            biased;
            () = token.cancelled() => return Err(cancelled(operation, resource)),
            () = tokio::time::sleep(wait) => {}
        }
        attempt += 1;
    }
}

fn cancelled(operation: Operation, resource: &str) -> Error {
    Error::Cancelled {
        operation,
        resource: resource.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(retries: u32) -> ExponentialBackoff {
        ExponentialBackoff::new(Duration::from_secs(3), Duration::from_secs(30), 1.5)
            .with_max_retries(retries)
    }

    fn transient(attempt: u32) -> Error {
        Error::Apply {
            operation: Operation::Create,
            resource: "app/db".into(),
            attempts: attempt,
            message: "etcdserver: request timed out".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let mut waits = Vec::new();

        let result = retry_notify(
            policy(5),
            &CancellationToken::new(),
            Operation::Create,
            "app/db",
            |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(transient(attempt))
                    } else {
                        Ok(attempt)
                    }
                }
            },
            |_, wait| waits.push(wait),
        )
        .await;

        assert_eq!(result.ok(), Some(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            waits,
            vec![Duration::from_secs(3), Duration::from_millis(4_500)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_runs_once() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = retry_notify(
            policy(0),
            &CancellationToken::new(),
            Operation::Create,
            "app/db",
            |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(transient(attempt)) }
            },
            |_, _| {},
        )
        .await;

        assert!(matches!(result, Err(Error::Apply { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = retry_notify(
            policy(5),
            &CancellationToken::new(),
            Operation::Create,
            "app/db",
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(Error::Parse {
                        resource: "kube-system/sealed-secrets-controller".into(),
                        message: "bad certificate".into(),
                    })
                }
            },
            |_, _| {},
        )
        .await;

        assert!(matches!(result, Err(Error::Parse { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_retrying() {
        let token = CancellationToken::new();
        let cancel = token.clone();

        let result: Result<()> = retry_notify(
            policy(5),
            &token,
            Operation::Update,
            "app/db",
            |attempt| async move { Err(transient(attempt)) },
            move |_, _| cancel.cancel(),
        )
        .await;

        assert!(matches!(result, Err(Error::Cancelled { .. })));
    }
}
