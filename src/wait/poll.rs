//! Condition polling with retryable-error classification.
//!
//! # Responsibilities
//! - Invoke a caller-supplied condition until it reports done
//! - Retry through provider errors whose code is allow-listed
//! - Abort on any other error, on cancellation, or after `steps` attempts

use std::fmt::Display;
use std::future::Future;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::observability::metrics;
use crate::provider::ErrorCode;
use crate::wait::backoff::Backoff;

/// Why a wait ended without the condition being met.
#[derive(Debug, Error)]
pub enum WaitError<E> {
    /// A non-retryable error, or the last retryable one once attempts ran out.
    #[error(transparent)]
    Condition(E),

    /// Every attempt reported "not done yet" without a retryable error.
    #[error("timed out waiting for the condition after {attempts} attempts")]
    Timeout { attempts: u32 },

    #[error("wait cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

impl<E> WaitError<E> {
    /// The provider error behind this outcome, if any.
    pub fn condition_error(&self) -> Option<&E> {
        match self {
            WaitError::Condition(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitError::Timeout { .. })
    }
}

/// Poll `condition` until it returns `Ok(true)`.
///
/// `Ok(false)` means "still in progress". Errors whose code appears in
/// `retryable` are remembered and retried; any other error is returned
/// immediately. After `backoff.steps` attempts the last retryable error is
/// returned if one was seen, otherwise [`WaitError::Timeout`].
pub async fn wait_for_with_retryable<F, Fut, E, S>(
    mut backoff: Backoff,
    cancel: &CancellationToken,
    mut condition: F,
    retryable: &[S],
) -> Result<(), WaitError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: ErrorCode + Display,
    S: AsRef<str>,
{
    let steps = backoff.steps.max(1);
    let mut last_retryable: Option<E> = None;

    for attempt in 1..=steps {
        if cancel.is_cancelled() {
            return Err(WaitError::Cancelled {
                attempts: attempt - 1,
            });
        }

        match condition().await {
            Ok(true) => {
                metrics::record_wait_attempt("done");
                tracing::debug!(attempt, "Condition met");
                return Ok(());
            }
            Ok(false) => {
                metrics::record_wait_attempt("pending");
                tracing::trace!(attempt, "Condition not met yet");
            }
            Err(err) => {
                let is_retryable = err
                    .code()
                    .is_some_and(|code| retryable.iter().any(|r| r.as_ref() == code));
                if !is_retryable {
                    metrics::record_wait_attempt("failed");
                    tracing::warn!(attempt, error = %err, "Condition failed with non-retryable error");
                    return Err(WaitError::Condition(err));
                }
                metrics::record_wait_attempt("retryable");
                tracing::debug!(attempt, error = %err, "Condition hit retryable error");
                last_retryable = Some(err);
            }
        }

        if attempt == steps {
            break;
        }

        let delay = backoff.step();
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => {
                tracing::debug!(attempt, "Wait cancelled during backoff");
                return Err(WaitError::Cancelled { attempts: attempt });
            }
        }
    }

    match last_retryable {
        Some(err) => {
            tracing::warn!(attempts = steps, error = %err, "Gave up after retryable errors");
            Err(WaitError::Condition(err))
        }
        None => {
            tracing::warn!(attempts = steps, "Gave up waiting for condition");
            Err(WaitError::Timeout { attempts: steps })
        }
    }
}

/// Poll `condition` with no retryable error codes: every error aborts.
pub async fn wait_for<F, Fut, E>(
    backoff: Backoff,
    cancel: &CancellationToken,
    condition: F,
) -> Result<(), WaitError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: ErrorCode + Display,
{
    wait_for_with_retryable::<F, Fut, E, &str>(backoff, cancel, condition, &[]).await
}
