//! Session registry.
//!
//! In-memory map from session ID to control handle. The registry stores
//! references and reads state for aggregation; it never mutates a
//! session itself.

use dashmap::DashMap;

use super::handle::SessionHandle;
use super::state::{StreamSession, StreamStatus};

// ============================================================================
// Statistics
// ============================================================================

/// Aggregate statistics over all registered sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct RegistryStats {
    /// Sessions currently registered.
    pub total: usize,
    /// Sessions not yet in a terminal status.
    pub active: usize,
    /// Sessions that emitted all their chunks.
    pub completed: usize,
    /// Sessions that ended in the error status.
    pub errored: usize,
    /// Sessions that were cancelled.
    pub cancelled: usize,
    /// Chunks emitted across all sessions.
    pub chunks_emitted: usize,
}

// ============================================================================
// Registry
// ============================================================================

/// Registry of stream sessions.
///
/// Thread-safe; the backing map is the only state shared across sessions.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, SessionHandle>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session handle under its ID.
    pub fn insert(&self, handle: SessionHandle) {
        self.sessions.insert(handle.id().to_string(), handle);
    }

    /// Get a session handle by ID.
    pub fn get(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// The most recently started session, if any.
    pub fn latest(&self) -> Option<SessionHandle> {
        // Collect first to avoid holding map references while reading
        // session state.
        let handles: Vec<SessionHandle> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        handles
            .into_iter()
            .max_by_key(|handle| handle.snapshot().started_at)
    }

    /// Check if a session is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    /// Snapshots of all registered sessions.
    pub fn snapshots(&self) -> Vec<StreamSession> {
        let handles: Vec<SessionHandle> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        handles.iter().map(SessionHandle::snapshot).collect()
    }

    /// Remove a session from the registry.
    ///
    /// Returns `true` if a session was removed. Removal only drops the
    /// registry's reference; a still-running worker finishes on its own.
    pub fn remove(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    /// Remove all sessions, returning how many were registered.
    pub fn clear(&self) -> usize {
        let count = self.sessions.len();
        self.sessions.clear();
        count
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Aggregate statistics across all registered sessions.
    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats::default();

        for snapshot in self.snapshots() {
            stats.total += 1;
            stats.chunks_emitted += snapshot.chunks.len();
            match snapshot.status {
                StreamStatus::Completed => stats.completed += 1,
                StreamStatus::Error => stats.errored += 1,
                StreamStatus::Cancelled => stats.cancelled += 1,
                StreamStatus::Pending | StreamStatus::Streaming | StreamStatus::Paused => {
                    stats.active += 1;
                }
            }
        }

        stats
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.sessions.len())
            .finish()
    }
}
