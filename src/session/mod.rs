//! Stream session management.
//!
//! # Architecture
//!
//! ```text
//!  ┌─────────────────┐        ┌───────────────┐
//!  │ SessionRegistry │──maps──▶ SessionWorker │  (one per session, runs in a tokio task)
//!  │  (ID → Handle)  │        │  emits chunks,│
//!  └────────┬────────┘        │  owns state   │
//!           │                 └───────▲───────┘
//!           │ clone                   │ shared state + watch/cancel signals
//!           ▼                         │
//!  ┌─────────────────┐                │
//!  │  SessionHandle  │────────────────┘  (cheap cloneable control surface)
//!  └─────────────────┘
//! ```
//!
//! - **SessionWorker** — the per-session emission loop; sole writer of the
//!   chunk list and of completion state.
//! - **SessionHandle** — cloneable reference carrying the control
//!   operations (pause/resume/cancel) and snapshot reads.
//! - **SessionRegistry** — maps session IDs to handles and aggregates
//!   statistics; never mutates a session.

mod handle;
mod registry;
mod sink;
mod state;
mod worker;

pub use handle::SessionHandle;
pub use registry::{RegistryStats, SessionRegistry};
pub use sink::{DeliveryError, DeliverySink};
pub use state::{CHUNK_ID_PREFIX, SESSION_ID_PREFIX, StreamChunk, StreamSession, StreamStatus};

pub(crate) use worker::{SessionWorker, WorkerParams};
