//! Retry execution with classified backoff.
//!
//! [`with_retry`] wraps any fallible async operation supplied by a caller
//! (typically a network call made elsewhere in the system) and re-runs it
//! on retryable failures, sleeping an exponentially growing delay between
//! attempts. Which failures are retryable is decided by the
//! [`classify`] heuristic, or by a caller-supplied classifier.
//!
//! The delivery loop itself is never retried; retries apply only to
//! operations handed in from outside.

mod classify;
mod policy;

use std::fmt::{Debug, Display};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::events::{EngineEvent, EventBus};

pub use classify::{ErrorCategory, classify};
pub use policy::{PolicyError, RetryPolicy};

// ============================================================================
// Errors
// ============================================================================

/// Terminal outcome of a retried operation that never succeeded.
#[derive(Debug, Error)]
pub enum RetryError<E: Display + Debug> {
    /// Every allowed attempt failed with a retryable error.
    #[error("retries exhausted after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: E },

    /// The failure's category is not in the policy's retryable set, so no
    /// retry was attempted after it.
    #[error("not retryable ({category}): {error}")]
    NotRetryable { category: ErrorCategory, error: E },

    /// The final attempt exceeded the operation timeout.
    #[error("operation timed out after {attempts} attempts ({limit:?} each)")]
    Timeout { attempts: u32, limit: Duration },
}

impl<E: Display + Debug> RetryError<E> {
    /// The underlying operation error, when one exists (timeouts have none).
    pub fn into_source(self) -> Option<E> {
        match self {
            Self::Exhausted { last_error, .. } => Some(last_error),
            Self::NotRetryable { error, .. } => Some(error),
            Self::Timeout { .. } => None,
        }
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Run `op` until it succeeds, retrying per `policy`.
///
/// Total attempts are `policy.max_retries + 1`: the initial try plus up to
/// `max_retries` retries. There is never a delay before the first attempt.
/// Failures are classified from their `Display` text via [`classify`].
///
/// Each scheduled retry publishes [`EngineEvent::RetryScheduled`] on
/// `events`; spending the whole budget publishes
/// [`EngineEvent::RetryExhausted`] before returning the last error.
pub async fn with_retry<T, E, F, Fut>(
    op: F,
    policy: &RetryPolicy,
    context: &str,
    events: &EventBus,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display + Debug,
{
    execute(op, policy, None, context, events, |e: &E| {
        classify(&e.to_string())
    })
    .await
}

/// Like [`with_retry`], but classifying failures with a caller-supplied
/// function instead of message sniffing.
pub async fn with_retry_classified_by<T, E, F, Fut, C>(
    op: F,
    policy: &RetryPolicy,
    context: &str,
    events: &EventBus,
    classifier: C,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display + Debug,
    C: Fn(&E) -> ErrorCategory,
{
    execute(op, policy, None, context, events, classifier).await
}

// ============================================================================
// Executor
// ============================================================================

/// A single attempt's failure: the operation's own error, or the attempt
/// overrunning its timeout.
enum Failure<E> {
    Op(E),
    Elapsed(Duration),
}

pub(crate) async fn execute<T, E, F, Fut, C>(
    mut op: F,
    policy: &RetryPolicy,
    attempt_timeout: Option<Duration>,
    context: &str,
    events: &EventBus,
    classifier: C,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display + Debug,
    C: Fn(&E) -> ErrorCategory,
{
    let total_attempts = policy.max_retries + 1;
    let mut attempt: u32 = 0;

    loop {
        let result = match attempt_timeout {
            Some(limit) => match tokio::time::timeout(limit, op()).await {
                Ok(outcome) => outcome.map_err(Failure::Op),
                Err(_) => Err(Failure::Elapsed(limit)),
            },
            None => op().await.map_err(Failure::Op),
        };

        let failure = match result {
            Ok(value) => return Ok(value),
            Err(failure) => failure,
        };

        let (category, text) = match &failure {
            Failure::Op(e) => (classifier(e), e.to_string()),
            Failure::Elapsed(limit) => (
                ErrorCategory::Timeout,
                format!("operation timed out after {}ms", limit.as_millis()),
            ),
        };

        if !policy.retries(category) {
            debug!(
                context = context,
                category = %category,
                error = %text,
                "failure is not retryable"
            );
            return Err(match failure {
                Failure::Op(error) => RetryError::NotRetryable { category, error },
                Failure::Elapsed(limit) => RetryError::Timeout {
                    attempts: attempt + 1,
                    limit,
                },
            });
        }

        if attempt >= policy.max_retries {
            warn!(
                context = context,
                attempts = total_attempts,
                error = %text,
                "retry budget exhausted"
            );
            events.publish(EngineEvent::RetryExhausted {
                context: context.to_string(),
                attempts: total_attempts,
                error: text,
            });
            return Err(match failure {
                Failure::Op(last_error) => RetryError::Exhausted {
                    attempts: total_attempts,
                    last_error,
                },
                Failure::Elapsed(limit) => RetryError::Timeout {
                    attempts: total_attempts,
                    limit,
                },
            });
        }

        let delay = policy.delay_for_attempt(attempt);
        attempt += 1;

        debug!(
            context = context,
            attempt = attempt,
            delay_ms = delay.as_millis() as u64,
            error = %text,
            "scheduling retry"
        );
        events.publish(EngineEvent::RetryScheduled {
            context: context.to_string(),
            attempt,
            delay_ms: delay.as_millis() as u64,
            error: text,
        });

        tokio::time::sleep(delay).await;
    }
}
