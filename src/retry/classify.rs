//! Heuristic failure classification.
//!
//! Maps a failure's message text into a small set of retry-relevant
//! categories by case-insensitive substring matching. This is best-effort
//! by design: callers that carry structured error metadata should prefer
//! [`with_retry_classified_by`](super::with_retry_classified_by) with
//! their own classifier and fall back to this one only for opaque errors.

use serde::{Deserialize, Serialize};

// ============================================================================
// ErrorCategory
// ============================================================================

/// Retry-relevant category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Connectivity failures (unreachable host, reset connections, DNS).
    Network,
    /// The operation ran out of time.
    Timeout,
    /// The upstream asked us to slow down (HTTP 429 and friends).
    RateLimit,
    /// Upstream server failures (HTTP 500/502/503).
    Server,
    /// Anything that matched no known pattern.
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Network => write!(f, "network"),
            ErrorCategory::Timeout => write!(f, "timeout"),
            ErrorCategory::RateLimit => write!(f, "rate_limit"),
            ErrorCategory::Server => write!(f, "server"),
            ErrorCategory::Unknown => write!(f, "unknown"),
        }
    }
}

// ============================================================================
// Classifier
// ============================================================================

const NETWORK_MARKERS: &[&str] = &[
    "network",
    "fetch",
    "connection refused",
    "connection reset",
    "dns",
];
const RATE_LIMIT_MARKERS: &[&str] = &["rate limit", "429"];
const SERVER_MARKERS: &[&str] = &[
    "500",
    "502",
    "503",
    "internal server error",
    "bad gateway",
    "service unavailable",
];

/// Classify a failure by its message text.
///
/// First match wins, in the order network, timeout, rate limit, server.
/// A message mentioning both a network marker and "timeout" therefore
/// classifies as [`ErrorCategory::Network`].
#[must_use]
pub fn classify(message: &str) -> ErrorCategory {
    let message = message.to_ascii_lowercase();

    if NETWORK_MARKERS.iter().any(|m| message.contains(m)) {
        ErrorCategory::Network
    } else if message.contains("timeout") || message.contains("timed out") {
        ErrorCategory::Timeout
    } else if RATE_LIMIT_MARKERS.iter().any(|m| message.contains(m)) {
        ErrorCategory::RateLimit
    } else if SERVER_MARKERS.iter().any(|m| message.contains(m)) {
        ErrorCategory::Server
    } else {
        ErrorCategory::Unknown
    }
}
