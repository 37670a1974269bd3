//! Trickle — paced streaming delivery of text with pause/resume/cancel
//! control and classified retry.
//!
//! The engine takes a block of text (typically an assistant's reply),
//! splits it into pieces at natural boundaries, and delivers those pieces
//! one at a time with configurable pacing. Each delivery runs as its own
//! session with a small state machine: sessions can be paused, resumed,
//! and cancelled cooperatively while the delivery loop is in flight.
//! Independently, any fallible async operation can be wrapped in the
//! retry executor, which classifies failures and backs off exponentially
//! between attempts.
//!
//! # Example
//!
//! ```no_run
//! use trickle::{StreamConfig, StreamEngine};
//!
//! # async fn demo() {
//! let engine = StreamEngine::new(StreamConfig {
//!     chunk_size: 500,
//!     chunk_delay_ms: 150,
//!     ..StreamConfig::default()
//! })
//! .unwrap();
//!
//! let mut events = engine.subscribe();
//! let handle = engine.submit("A long reply to deliver piece by piece...");
//!
//! while let Ok(event) = events.recv().await {
//!     println!("{event:?}");
//!     if handle.status().is_terminal() {
//!         break;
//!     }
//! }
//! # }
//! ```
//!
//! The engine performs no network I/O and persists nothing: it is an
//! in-process library, and the text it delivers comes from its callers.

pub mod chunker;
pub mod config;
pub mod engine;
pub mod events;
pub mod retry;
pub mod session;

pub use config::{ConfigError, StreamConfig};
pub use engine::{StreamEngine, SubmitOptions};
pub use events::{EngineEvent, EventBus};
pub use retry::{
    ErrorCategory, PolicyError, RetryError, RetryPolicy, classify, with_retry,
    with_retry_classified_by,
};
pub use session::{
    DeliveryError, DeliverySink, RegistryStats, SessionHandle, SessionRegistry, StreamChunk,
    StreamSession, StreamStatus,
};
