//! # Call Bounds
//!
//! Every network call races the caller's cancellation token and a per-call
//! timeout. Cancellation wins ties.

use crate::error::{Error, Operation, Result};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Run `call` unless `token` is cancelled or `timeout` elapses first
///
/// # Errors
///
/// Returns [`Error::Cancelled`] on cancellation, [`Error::Network`] on
/// timeout, or whatever `call` itself fails with.
pub async fn bounded<T, F>(
    token: &CancellationToken,
    timeout: Duration,
    operation: Operation,
    resource: &str,
    call: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        () = token.cancelled() => Err(Error::Cancelled {
            operation,
            resource: resource.to_string(),
        }),
        outcome = tokio::time::timeout(timeout, call) => match outcome {
            Ok(result) => result,
            Err(_elapsed) => Err(Error::Network {
                operation,
                resource: resource.to_string(),
                message: format!("timed out after {}s", timeout.as_secs_f64()),
                hint: None,
            }),
        },
    }
}
