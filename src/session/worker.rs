//! Per-session delivery worker.
//!
//! Each submitted session gets a dedicated tokio task that drives the
//! emission loop: it is the sole writer of the session's chunk list and
//! of completion state, emits chunks in index order with pacing between
//! them, blocks while paused, and honors cooperative cancellation at
//! iteration boundaries. Terminal notifications are published exactly
//! once, by this task, after all chunk notifications.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::events::{EngineEvent, EventBus};

use super::handle::{LOCK_POISONED, SessionHandle, SharedSession};
use super::sink::{DeliveryError, DeliverySink};
use super::state::{StreamChunk, StreamSession, StreamStatus};

// ============================================================================
// Worker
// ============================================================================

/// Inputs for spawning a session worker.
pub(crate) struct WorkerParams {
    pub session: StreamSession,
    pub pieces: Vec<String>,
    pub chunk_delay: Duration,
    pub emit_typing: bool,
    pub metadata: Option<serde_json::Value>,
    pub sink: Option<Arc<dyn DeliverySink>>,
}

/// The per-session emission task.
pub(crate) struct SessionWorker {
    id: String,
    channel: Option<String>,
    shared: Arc<SharedSession>,
    pieces: Vec<String>,
    chunk_delay: Duration,
    emit_typing: bool,
    metadata: Option<serde_json::Value>,
    sink: Option<Arc<dyn DeliverySink>>,
    events: EventBus,
}

/// How the emission loop ended.
enum Outcome {
    Completed,
    Cancelled,
    Failed(DeliveryError),
}

impl SessionWorker {
    /// Spawn the worker task for a new session.
    ///
    /// Returns the control handle and the task's join handle.
    pub(crate) fn spawn(
        params: WorkerParams,
        events: EventBus,
    ) -> (SessionHandle, JoinHandle<()>) {
        let id = params.session.id.clone();
        let channel = params.session.channel.clone();
        let shared = Arc::new(SharedSession::new(params.session));
        let handle = SessionHandle::new(id.clone(), shared.clone(), events.clone());

        let worker = Self {
            id,
            channel,
            shared,
            pieces: params.pieces,
            chunk_delay: params.chunk_delay,
            emit_typing: params.emit_typing,
            metadata: params.metadata,
            sink: params.sink,
            events,
        };
        let task = tokio::spawn(worker.run());

        (handle, task)
    }

    async fn run(mut self) {
        debug!(session_id = %self.id, "session worker started");
        let total = self.pieces.len();

        {
            let mut session = self.shared.session.write().expect(LOCK_POISONED);
            // A caller may have cancelled between submit and the task's
            // first poll; a terminal status stays untouched.
            if session.status == StreamStatus::Pending {
                session.status = StreamStatus::Streaming;
            }
        }
        self.events.publish(EngineEvent::StreamStarted {
            session_id: self.id.clone(),
            total_chunks: total,
        });

        let typing = self.emit_typing && !self.shared.cancel.is_cancelled();
        if typing {
            self.events.publish(EngineEvent::TypingStarted {
                session_id: self.id.clone(),
                channel: self.channel.clone(),
            });
        }

        let outcome = self.emit_chunks().await;
        self.finalize(outcome, typing);
    }

    // ------------------------------------------------------------------------
    // Emission Loop
    // ------------------------------------------------------------------------

    async fn emit_chunks(&mut self) -> Outcome {
        let total = self.pieces.len();
        let pieces = std::mem::take(&mut self.pieces);

        for (index, content) in pieces.into_iter().enumerate() {
            // Cancellation is cooperative: checked at iteration boundaries.
            if self.shared.cancel.is_cancelled() {
                return Outcome::Cancelled;
            }
            if !self.wait_while_paused().await {
                return Outcome::Cancelled;
            }

            let chunk = StreamChunk::new(index, content, index + 1 == total, self.metadata.clone());

            // The chunk is recorded only after the sink accepted it, so
            // the session never claims more than was delivered.
            if let Some(sink) = &self.sink {
                if let Err(e) = sink.deliver(&chunk).await {
                    return Outcome::Failed(e);
                }
            }

            {
                let mut session = self.shared.session.write().expect(LOCK_POISONED);
                session.chunks.push(chunk.clone());
            }
            self.events.publish(EngineEvent::ChunkReady {
                session_id: self.id.clone(),
                chunk,
            });

            if index + 1 < total && !self.chunk_delay.is_zero() {
                // Pacing sleep between chunks; a cancel request cuts it
                // short and is acted on at the top of the next iteration.
                tokio::select! {
                    _ = tokio::time::sleep(self.chunk_delay) => {}
                    _ = self.shared.cancel.cancelled() => {}
                }
            }
        }

        Outcome::Completed
    }

    /// Block while the session is paused.
    ///
    /// Returns `false` when cancellation ended the wait.
    async fn wait_while_paused(&self) -> bool {
        let mut paused_rx = self.shared.paused.subscribe();
        loop {
            if self.shared.cancel.is_cancelled() {
                return false;
            }
            if !*paused_rx.borrow_and_update() {
                return true;
            }
            tokio::select! {
                changed = paused_rx.changed() => {
                    if changed.is_err() {
                        return true;
                    }
                }
                _ = self.shared.cancel.cancelled() => return false,
            }
        }
    }

    // ------------------------------------------------------------------------
    // Finalization
    // ------------------------------------------------------------------------

    fn finalize(&self, outcome: Outcome, typing: bool) {
        let snapshot = {
            let mut session = self.shared.session.write().expect(LOCK_POISONED);
            // A cancel that raced in keeps its terminal status; the loop's
            // outcome decides otherwise.
            if !session.status.is_terminal() {
                match &outcome {
                    Outcome::Completed => session.status = StreamStatus::Completed,
                    Outcome::Cancelled => session.status = StreamStatus::Cancelled,
                    Outcome::Failed(e) => {
                        session.status = StreamStatus::Error;
                        session.error = Some(e.to_string());
                    }
                }
                session.finished_at = Some(Utc::now());
            }
            session.clone()
        };

        match snapshot.status {
            StreamStatus::Completed => {
                info!(
                    session_id = %self.id,
                    chunks = snapshot.chunks.len(),
                    "stream completed"
                );
                self.events
                    .publish(EngineEvent::StreamCompleted { session: snapshot });
            }
            StreamStatus::Cancelled => {
                info!(
                    session_id = %self.id,
                    chunks = snapshot.chunks.len(),
                    "stream cancelled"
                );
                self.events.publish(EngineEvent::StreamCancelled {
                    session_id: self.id.clone(),
                });
            }
            StreamStatus::Error => {
                let message = snapshot.error.unwrap_or_default();
                warn!(session_id = %self.id, error = %message, "stream failed");
                self.events.publish(EngineEvent::StreamError {
                    session_id: self.id.clone(),
                    message,
                });
            }
            _ => {}
        }

        if typing {
            self.events.publish(EngineEvent::TypingStopped {
                session_id: self.id.clone(),
                channel: self.channel.clone(),
            });
        }

        self.shared.done.send_replace(true);
        debug!(session_id = %self.id, "session worker stopped");
    }
}
