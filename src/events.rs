//! Engine notification events and the fan-out broadcaster.
//!
//! Every observable moment in the engine — session lifecycle, per-chunk
//! delivery, typing indicators, retry attempts — is published as an
//! [`EngineEvent`] on the [`EventBus`]. Consumers (UI layers, bot
//! adapters, loggers) subscribe and receive their own copy of each event.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::session::{StreamChunk, StreamSession};

/// Default buffer capacity for the broadcast channel.
const DEFAULT_BUS_CAPACITY: usize = 256;

// ============================================================================
// Events
// ============================================================================

/// A notification published by the engine.
///
/// Events for one session are published in order: `StreamStarted`, then
/// `ChunkReady` in strictly increasing index order, then exactly one
/// terminal event (`StreamCompleted`, `StreamError`, or `StreamCancelled`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A session entered the streaming state.
    StreamStarted {
        session_id: String,
        total_chunks: usize,
    },
    /// A chunk was delivered and appended to its session.
    ChunkReady {
        session_id: String,
        chunk: StreamChunk,
    },
    /// A session emitted all of its chunks.
    StreamCompleted { session: StreamSession },
    /// A session failed while delivering.
    StreamError { session_id: String, message: String },
    /// A session was cancelled before emitting all chunks.
    StreamCancelled { session_id: String },
    /// A session was paused by a caller.
    StreamPaused { session_id: String },
    /// A paused session resumed streaming.
    StreamResumed { session_id: String },
    /// Typing indicator switched on for a session.
    TypingStarted {
        session_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel: Option<String>,
    },
    /// Typing indicator switched off for a session.
    TypingStopped {
        session_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel: Option<String>,
    },
    /// A retry of a wrapped operation was scheduled.
    RetryScheduled {
        context: String,
        /// 1-based number of the upcoming retry.
        attempt: u32,
        delay_ms: u64,
        error: String,
    },
    /// A wrapped operation failed on its final allowed attempt.
    RetryExhausted {
        context: String,
        attempts: u32,
        error: String,
    },
}

impl EngineEvent {
    /// The session this event belongs to, if it is session-scoped.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::StreamStarted { session_id, .. }
            | Self::ChunkReady { session_id, .. }
            | Self::StreamError { session_id, .. }
            | Self::StreamCancelled { session_id }
            | Self::StreamPaused { session_id }
            | Self::StreamResumed { session_id }
            | Self::TypingStarted { session_id, .. }
            | Self::TypingStopped { session_id, .. } => Some(session_id),
            Self::StreamCompleted { session } => Some(&session.id),
            Self::RetryScheduled { .. } | Self::RetryExhausted { .. } => None,
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Fan-out broadcaster for [`EngineEvent`]s.
///
/// Cheap to clone. Publishing never blocks; events published while no
/// subscriber exists are dropped, and a subscriber that falls more than
/// the buffer capacity behind observes a lag error from `recv()`.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    /// Create a bus with the given buffer capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: EngineEvent) {
        // A send error only means there are no subscribers right now.
        let _ = self.tx.send(event);
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tags() {
        let event = EngineEvent::StreamStarted {
            session_id: "session_abc".to_string(),
            total_chunks: 3,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"stream_started\""));
        assert!(json.contains("\"total_chunks\":3"));

        let event = EngineEvent::RetryScheduled {
            context: "send-reply".to_string(),
            attempt: 2,
            delay_ms: 2000,
            error: "network unreachable".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"retry_scheduled\""));
        assert!(json.contains("\"attempt\":2"));
    }

    #[test]
    fn typing_event_omits_empty_channel() {
        let event = EngineEvent::TypingStarted {
            session_id: "session_abc".to_string(),
            channel: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("channel"));

        let parsed: EngineEvent =
            serde_json::from_str(r#"{"type":"typing_started","session_id":"session_abc"}"#)
                .unwrap();
        match parsed {
            EngineEvent::TypingStarted { channel, .. } => assert!(channel.is_none()),
            _ => panic!("wrong event type"),
        }
    }

    #[tokio::test]
    async fn bus_fans_out_to_all_subscribers() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(EngineEvent::StreamCancelled {
            session_id: "session_abc".to_string(),
        });

        for rx in [&mut rx1, &mut rx2] {
            match rx.recv().await.unwrap() {
                EngineEvent::StreamCancelled { session_id } => {
                    assert_eq!(session_id, "session_abc");
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[test]
    fn publish_without_subscribers_is_a_noop() {
        let bus = EventBus::default();
        bus.publish(EngineEvent::StreamPaused {
            session_id: "session_abc".to_string(),
        });
        assert_eq!(bus.subscriber_count(), 0);
    }
}
