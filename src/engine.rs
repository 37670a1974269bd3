//! The streaming delivery engine.
//!
//! `StreamEngine` is the facade embedders hold: it chunks submitted text,
//! spawns a delivery worker per session, routes control operations through
//! the registry, wraps caller-supplied operations in the retry executor,
//! and publishes every observable moment on its event bus.

use std::fmt::{Debug, Display};
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::chunker;
use crate::config::{ConfigError, StreamConfig};
use crate::events::{EngineEvent, EventBus};
use crate::retry::{self, RetryError, RetryPolicy, classify};
use crate::session::{
    DeliverySink, RegistryStats, SessionHandle, SessionRegistry, SessionWorker, StreamSession,
    WorkerParams,
};

const CONFIG_POISONED: &str = "config lock poisoned";
const WORKERS_POISONED: &str = "worker registry poisoned";

// ============================================================================
// Submit Options
// ============================================================================

/// Per-submission options for [`StreamEngine::submit_with`].
#[derive(Default)]
pub struct SubmitOptions {
    /// Channel label for channel-scoped typing notifications.
    pub channel: Option<String>,
    /// Opaque metadata attached to every chunk of the session.
    pub metadata: Option<serde_json::Value>,
    /// Optional sink receiving each chunk as it is emitted.
    pub sink: Option<Arc<dyn DeliverySink>>,
}

// ============================================================================
// Engine
// ============================================================================

/// The streaming delivery engine.
///
/// Construct one per process (or per logical consumer) and share it by
/// reference; all methods take `&self`. Sessions run on their own tokio
/// tasks and share no state with each other.
pub struct StreamEngine {
    config: RwLock<StreamConfig>,
    registry: SessionRegistry,
    events: EventBus,
    // std Mutex is correct here — the lock is never held across awaits.
    workers: Mutex<Vec<(SessionHandle, JoinHandle<()>)>>,
}

impl StreamEngine {
    /// Create an engine with the given configuration.
    ///
    /// Fails fast on invalid configuration values.
    pub fn new(config: StreamConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config: RwLock::new(config),
            registry: SessionRegistry::new(),
            events: EventBus::default(),
            workers: Mutex::new(Vec::new()),
        })
    }

    /// Create an engine with the default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            config: RwLock::new(StreamConfig::default()),
            registry: SessionRegistry::new(),
            events: EventBus::default(),
            workers: Mutex::new(Vec::new()),
        }
    }

    // ------------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------------

    /// A copy of the current configuration.
    pub fn config(&self) -> StreamConfig {
        self.config.read().expect(CONFIG_POISONED).clone()
    }

    /// Replace the configuration.
    ///
    /// Validation happens before the swap; sessions already in flight keep
    /// the configuration they were submitted with.
    pub fn reconfigure(&self, config: StreamConfig) -> Result<(), ConfigError> {
        config.validate()?;
        *self.config.write().expect(CONFIG_POISONED) = config;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    /// Subscribe to all engine notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// The engine's event bus, for handing to collaborating components.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    // ------------------------------------------------------------------------
    // Streaming
    // ------------------------------------------------------------------------

    /// Submit text for streaming delivery with default options.
    ///
    /// Returns immediately with the session's control handle; use
    /// [`SessionHandle::wait`] to block until the session is terminal.
    pub fn submit(&self, text: &str) -> SessionHandle {
        self.submit_with(text, SubmitOptions::default())
    }

    /// Submit text for streaming delivery.
    pub fn submit_with(&self, text: &str, opts: SubmitOptions) -> SessionHandle {
        let config = self.config();
        let pieces = chunker::chunk(text, config.chunk_size);
        let session = StreamSession::new(pieces.len(), opts.channel);
        let session_id = session.id.clone();
        let total_chunks = pieces.len();

        let params = WorkerParams {
            session,
            pieces,
            chunk_delay: config.chunk_delay(),
            emit_typing: config.emit_typing,
            metadata: opts.metadata,
            sink: opts.sink,
        };
        let (handle, task) = SessionWorker::spawn(params, self.events.clone());

        self.registry.insert(handle.clone());
        {
            let mut workers = self.workers.lock().expect(WORKERS_POISONED);
            workers.retain(|(_, task)| !task.is_finished());
            workers.push((handle.clone(), task));
        }

        info!(
            session_id = %session_id,
            total_chunks = total_chunks,
            "stream session submitted"
        );
        handle
    }

    // ------------------------------------------------------------------------
    // Session Control
    // ------------------------------------------------------------------------

    /// Pause a streaming session. Returns `false` for unknown sessions or
    /// sessions not currently streaming.
    pub fn pause(&self, session_id: &str) -> bool {
        self.registry
            .get(session_id)
            .is_some_and(|handle| handle.pause())
    }

    /// Resume a paused session. Returns `false` for unknown sessions or
    /// sessions not currently paused.
    pub fn resume(&self, session_id: &str) -> bool {
        self.registry
            .get(session_id)
            .is_some_and(|handle| handle.resume())
    }

    /// Cancel a session. Returns `false` for unknown sessions or sessions
    /// already in a terminal status.
    pub fn cancel(&self, session_id: &str) -> bool {
        self.registry
            .get(session_id)
            .is_some_and(|handle| handle.cancel())
    }

    // ------------------------------------------------------------------------
    // Session Inspection
    // ------------------------------------------------------------------------

    /// Snapshot of a session by ID, or of the most recently started
    /// session when no ID is given.
    pub fn session(&self, session_id: Option<&str>) -> Option<StreamSession> {
        match session_id {
            Some(id) => self.registry.get(id).map(|handle| handle.snapshot()),
            None => self.registry.latest().map(|handle| handle.snapshot()),
        }
    }

    /// Snapshots of all registered sessions.
    pub fn sessions(&self) -> Vec<StreamSession> {
        self.registry.snapshots()
    }

    /// Remove a session from the registry. Returns `true` if it existed.
    pub fn clear_session(&self, session_id: &str) -> bool {
        self.registry.remove(session_id)
    }

    /// Remove all sessions from the registry, returning the count.
    pub fn clear_all(&self) -> usize {
        self.registry.clear()
    }

    /// Aggregate statistics over registered sessions.
    pub fn stats(&self) -> RegistryStats {
        self.registry.stats()
    }

    // ------------------------------------------------------------------------
    // Retry
    // ------------------------------------------------------------------------

    /// Run a caller-supplied operation with the engine's default retry
    /// policy and per-attempt operation timeout.
    ///
    /// `context` labels the operation in retry notifications and logs.
    pub async fn with_retry<T, E, F, Fut>(
        &self,
        context: &str,
        op: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display + Debug,
    {
        let policy = self.config.read().expect(CONFIG_POISONED).retry_policy();
        self.with_retry_policy(context, &policy, op).await
    }

    /// Run a caller-supplied operation with an explicit retry policy,
    /// keeping the engine's operation timeout.
    pub async fn with_retry_policy<T, E, F, Fut>(
        &self,
        context: &str,
        policy: &RetryPolicy,
        op: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display + Debug,
    {
        let timeout = self
            .config
            .read()
            .expect(CONFIG_POISONED)
            .operation_timeout();
        retry::execute(op, policy, Some(timeout), context, &self.events, |e: &E| {
            classify(&e.to_string())
        })
        .await
    }

    // ------------------------------------------------------------------------
    // Shutdown
    // ------------------------------------------------------------------------

    /// Gracefully shut down: cancel every live session and wait for all
    /// worker tasks to finish.
    pub async fn shutdown(&self) {
        let workers = {
            let mut guard = self.workers.lock().expect(WORKERS_POISONED);
            std::mem::take(&mut *guard)
        };
        if workers.is_empty() {
            return;
        }

        info!(count = workers.len(), "shutting down stream engine");
        for (handle, _) in &workers {
            handle.cancel();
        }
        for (handle, task) in workers {
            if let Err(e) = task.await {
                warn!(
                    session_id = %handle.id(),
                    error = %e,
                    "session worker panicked during shutdown"
                );
            }
        }
        info!("stream engine shutdown complete");
    }
}

impl Debug for StreamEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamEngine")
            .field("sessions", &self.registry.len())
            .finish()
    }
}
