//! Integration tests for the retry executor and its notifications.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use trickle::{
    EngineEvent, EventBus, RetryError, RetryPolicy, StreamConfig, StreamEngine, with_retry,
};

mod common;
use common::fast_config;

fn fast_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay_ms: 5,
        max_delay_ms: 100,
        ..RetryPolicy::default()
    }
}

// ============================================================================
// Attempt Counting
// ============================================================================

#[tokio::test]
async fn two_retries_means_three_attempts() {
    let events = EventBus::default();
    let calls = Arc::new(AtomicU32::new(0));

    let c = calls.clone();
    let result: Result<(), RetryError<String>> = with_retry(
        move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err("network down".to_string())
            }
        },
        &fast_policy(2),
        "send-reply",
        &events,
    )
    .await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    match result.unwrap_err() {
        RetryError::Exhausted {
            attempts,
            last_error,
        } => {
            assert_eq!(attempts, 3);
            assert_eq!(last_error, "network down");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn unknown_errors_are_not_retried() {
    let events = EventBus::default();
    let calls = Arc::new(AtomicU32::new(0));

    let c = calls.clone();
    let result: Result<(), RetryError<String>> = with_retry(
        move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err("unexpected state".to_string())
            }
        },
        &fast_policy(5),
        "lookup",
        &events,
    )
    .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(matches!(result, Err(RetryError::NotRetryable { .. })));
}

// ============================================================================
// Backoff Schedule
// ============================================================================

#[tokio::test]
async fn scheduled_delays_double_up_to_the_cap() {
    let events = EventBus::default();
    let mut rx = events.subscribe();

    let policy = RetryPolicy {
        max_retries: 4,
        base_delay_ms: 10,
        max_delay_ms: 40,
        ..RetryPolicy::default()
    };

    let result: Result<(), RetryError<String>> = with_retry(
        || async { Err("upstream returned 502".to_string()) },
        &policy,
        "flaky-upstream",
        &events,
    )
    .await;
    assert!(matches!(result, Err(RetryError::Exhausted { attempts: 5, .. })));

    let mut delays = Vec::new();
    let mut exhausted = None;
    while let Ok(event) = rx.try_recv() {
        match event {
            EngineEvent::RetryScheduled {
                context,
                attempt,
                delay_ms,
                error,
            } => {
                assert_eq!(context, "flaky-upstream");
                assert_eq!(attempt as usize, delays.len() + 1);
                assert!(error.contains("502"));
                delays.push(delay_ms);
            }
            EngineEvent::RetryExhausted {
                context, attempts, ..
            } => {
                assert_eq!(context, "flaky-upstream");
                exhausted = Some(attempts);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    assert_eq!(delays, vec![10, 20, 40, 40]);
    assert_eq!(exhausted, Some(5));
}

// ============================================================================
// Engine Integration
// ============================================================================

#[tokio::test]
async fn engine_retry_recovers_and_notifies() {
    let engine = StreamEngine::new(fast_config()).unwrap();
    let mut events = engine.subscribe();
    let calls = Arc::new(AtomicU32::new(0));

    let c = calls.clone();
    let result: Result<&str, RetryError<String>> = engine
        .with_retry("generate-reply", move || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("rate limit exceeded".to_string())
                } else {
                    Ok("reply text")
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), "reply text");
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let mut scheduled = 0;
    while let Ok(event) = events.try_recv() {
        if let EngineEvent::RetryScheduled { context, .. } = event {
            assert_eq!(context, "generate-reply");
            scheduled += 1;
        }
    }
    assert_eq!(scheduled, 2);
}

#[tokio::test]
async fn engine_applies_operation_timeout_per_attempt() {
    let engine = StreamEngine::new(StreamConfig {
        operation_timeout_ms: 30,
        ..fast_config()
    })
    .unwrap();
    let calls = Arc::new(AtomicU32::new(0));

    let c = calls.clone();
    let result: Result<(), RetryError<String>> = engine
        .with_retry_policy("slow-op", &fast_policy(1), move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok(())
            }
        })
        .await;

    // The timed-out attempt classifies as a timeout, which is retryable
    // under the default policy; the budget then runs out.
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    match result.unwrap_err() {
        RetryError::Timeout { attempts, limit } => {
            assert_eq!(attempts, 2);
            assert_eq!(limit, Duration::from_millis(30));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn custom_retryable_set_is_honored() {
    let engine = StreamEngine::new(fast_config()).unwrap();
    let calls = Arc::new(AtomicU32::new(0));

    // Timeouts excluded from the retryable set: one attempt only.
    let policy = RetryPolicy {
        retry_on: vec![trickle::ErrorCategory::Network],
        ..fast_policy(5)
    };

    let c = calls.clone();
    let result: Result<(), RetryError<String>> = engine
        .with_retry_policy("no-timeout-retry", &policy, move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err("request timed out".to_string())
            }
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(matches!(result, Err(RetryError::NotRetryable { .. })));
}
