//! Session control handle.
//!
//! `SessionHandle` is the cheap-to-clone reference a caller keeps for a
//! submitted session. Control operations return `bool` rather than an
//! error: pausing a session that is not streaming, or cancelling one that
//! already finished, are expected races in normal use.

use std::sync::{Arc, RwLock};

use chrono::Utc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::events::{EngineEvent, EventBus};

use super::state::{StreamSession, StreamStatus};

pub(crate) const LOCK_POISONED: &str = "session lock poisoned";

// ============================================================================
// Shared State
// ============================================================================

/// State shared between a session's worker and its handles.
///
/// The lock guards are always scoped and never held across await points.
pub(crate) struct SharedSession {
    pub(crate) session: RwLock<StreamSession>,
    /// Pause flag; the worker blocks on changes while it reads `true`.
    pub(crate) paused: watch::Sender<bool>,
    /// Cancellation signal, observed at the worker's checkpoints.
    pub(crate) cancel: CancellationToken,
    /// Flipped to `true` once by the worker when the session is terminal.
    pub(crate) done: watch::Sender<bool>,
}

impl SharedSession {
    pub(crate) fn new(session: StreamSession) -> Self {
        let (paused, _) = watch::channel(false);
        let (done, _) = watch::channel(false);
        Self {
            session: RwLock::new(session),
            paused,
            cancel: CancellationToken::new(),
            done,
        }
    }
}

// ============================================================================
// Handle
// ============================================================================

/// Handle for observing and controlling one stream session.
///
/// Cheap to clone; all clones refer to the same session.
#[derive(Clone)]
pub struct SessionHandle {
    id: String,
    shared: Arc<SharedSession>,
    events: EventBus,
}

impl SessionHandle {
    pub(crate) fn new(id: String, shared: Arc<SharedSession>, events: EventBus) -> Self {
        Self { id, shared, events }
    }

    /// The session ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Current status.
    pub fn status(&self) -> StreamStatus {
        self.shared.session.read().expect(LOCK_POISONED).status
    }

    /// A point-in-time copy of the full session record.
    pub fn snapshot(&self) -> StreamSession {
        self.shared.session.read().expect(LOCK_POISONED).clone()
    }

    // ------------------------------------------------------------------------
    // Control
    // ------------------------------------------------------------------------

    /// Pause the session. Only legal while streaming; returns `false`
    /// otherwise. The pause takes effect at the worker's next iteration
    /// boundary — a chunk already being emitted still goes out.
    pub fn pause(&self) -> bool {
        {
            let mut session = self.shared.session.write().expect(LOCK_POISONED);
            if session.status != StreamStatus::Streaming {
                return false;
            }
            session.status = StreamStatus::Paused;
        }
        self.shared.paused.send_replace(true);

        debug!(session_id = %self.id, "stream paused");
        self.events.publish(EngineEvent::StreamPaused {
            session_id: self.id.clone(),
        });
        true
    }

    /// Resume a paused session. Only legal while paused; returns `false`
    /// otherwise.
    pub fn resume(&self) -> bool {
        {
            let mut session = self.shared.session.write().expect(LOCK_POISONED);
            if session.status != StreamStatus::Paused {
                return false;
            }
            session.status = StreamStatus::Streaming;
        }
        self.shared.paused.send_replace(false);

        debug!(session_id = %self.id, "stream resumed");
        self.events.publish(EngineEvent::StreamResumed {
            session_id: self.id.clone(),
        });
        true
    }

    /// Cancel the session. Returns `false` when it already reached a
    /// terminal status (including an earlier cancel), so a double cancel
    /// reports failure the second time.
    ///
    /// The status flips to cancelled immediately; the worker observes the
    /// signal at its next checkpoint, stops emitting, and publishes the
    /// terminal notification.
    pub fn cancel(&self) -> bool {
        {
            let mut session = self.shared.session.write().expect(LOCK_POISONED);
            if session.status.is_terminal() {
                return false;
            }
            session.status = StreamStatus::Cancelled;
            session.finished_at = Some(Utc::now());
        }
        self.shared.cancel.cancel();

        debug!(session_id = %self.id, "stream cancel requested");
        true
    }

    /// Record one retry attempt against this session. Returns the new
    /// count. Intended for callers that wrap their upstream generation in
    /// [`with_retry`](crate::retry::with_retry) on behalf of one session.
    pub fn record_retry(&self) -> u32 {
        let mut session = self.shared.session.write().expect(LOCK_POISONED);
        session.retry_count += 1;
        session.retry_count
    }

    // ------------------------------------------------------------------------
    // Waiting
    // ------------------------------------------------------------------------

    /// Wait until the session reaches a terminal status and return it.
    pub async fn wait(&self) -> StreamStatus {
        let mut done_rx = self.shared.done.subscribe();
        while !*done_rx.borrow_and_update() {
            if done_rx.changed().await.is_err() {
                break;
            }
        }
        self.status()
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("status", &self.status())
            .finish()
    }
}
