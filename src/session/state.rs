//! Session and chunk data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

// ============================================================================
// ID Prefixes
// ============================================================================

/// ID prefix for sessions.
pub const SESSION_ID_PREFIX: &str = "session_";

/// ID prefix for chunks.
pub const CHUNK_ID_PREFIX: &str = "chunk_";

// ============================================================================
// Status
// ============================================================================

/// Lifecycle status of a stream session.
///
/// `Pending` and `Streaming` are transient, `Paused` is re-enterable from
/// and to `Streaming` only, and the remaining three are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamStatus {
    /// Created but not yet picked up by its delivery worker.
    Pending,
    /// Actively emitting chunks.
    Streaming,
    /// Suspended by a caller; no chunks are emitted until resumed.
    Paused,
    /// All chunks were emitted.
    Completed,
    /// Cancelled before all chunks were emitted.
    Cancelled,
    /// The delivery loop failed unexpectedly.
    Error,
}

impl StreamStatus {
    /// Whether no further transition is legal from this status.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Error)
    }
}

impl std::fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamStatus::Pending => write!(f, "pending"),
            StreamStatus::Streaming => write!(f, "streaming"),
            StreamStatus::Paused => write!(f, "paused"),
            StreamStatus::Completed => write!(f, "completed"),
            StreamStatus::Cancelled => write!(f, "cancelled"),
            StreamStatus::Error => write!(f, "error"),
        }
    }
}

// ============================================================================
// Chunk
// ============================================================================

/// One ordered piece of a session's text, delivered as an atomic unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Unique chunk ID.
    pub id: String,
    /// Zero-based position within the session.
    pub index: usize,
    /// The text content of this piece.
    pub content: String,
    /// Whether this is the session's final chunk.
    pub is_last: bool,
    /// When the chunk was constructed for delivery.
    pub created_at: DateTime<Utc>,
    /// Opaque caller-supplied metadata attached at submission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl StreamChunk {
    pub(crate) fn new(
        index: usize,
        content: String,
        is_last: bool,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: format!("{}{}", CHUNK_ID_PREFIX, Ulid::new()),
            index,
            content,
            is_last,
            created_at: Utc::now(),
            metadata,
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// One end-to-end streaming delivery of a single text payload.
///
/// The record is mutated only by the session's delivery worker and its
/// control handle; everything else reads cloned snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSession {
    /// Unique session ID.
    pub id: String,
    /// Current lifecycle status.
    pub status: StreamStatus,
    /// Chunks emitted so far, in index order with no gaps.
    pub chunks: Vec<StreamChunk>,
    /// Total chunk count computed at creation.
    pub total_chunks: usize,
    /// Channel the session belongs to, for channel-scoped notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// When the session was created.
    pub started_at: DateTime<Utc>,
    /// When the session reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Failure message when the status is [`StreamStatus::Error`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Retries recorded against this session by its submitting caller.
    #[serde(default)]
    pub retry_count: u32,
}

impl StreamSession {
    pub(crate) fn new(total_chunks: usize, channel: Option<String>) -> Self {
        Self {
            id: format!("{}{}", SESSION_ID_PREFIX, Ulid::new()),
            status: StreamStatus::Pending,
            chunks: Vec::new(),
            total_chunks,
            channel,
            started_at: Utc::now(),
            finished_at: None,
            error: None,
            retry_count: 0,
        }
    }
}
