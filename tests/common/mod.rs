#![allow(dead_code)]
//! Common test utilities.

use std::time::Duration;

use tokio::sync::broadcast;

use trickle::{EngineEvent, StreamChunk, StreamConfig};

/// Upper bound on any single event wait; keeps broken tests from hanging.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// A configuration tuned for fast tests.
pub fn fast_config() -> StreamConfig {
    StreamConfig {
        chunk_size: 40,
        chunk_delay_ms: 1,
        retry_base_delay_ms: 5,
        ..StreamConfig::default()
    }
}

/// Five sentences of 36 characters each; chunks to exactly five pieces at
/// a target size of 40.
pub fn five_sentence_text() -> String {
    ["Alpha beta gamma delta epsilon zeta."; 5].join(" ")
}

/// Receive the next event, failing the test on timeout or closure.
pub async fn next_event(rx: &mut broadcast::Receiver<EngineEvent>) -> EngineEvent {
    tokio::time::timeout(EVENT_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}

/// Receive events until the next `ChunkReady`, returning its chunk.
pub async fn next_chunk(rx: &mut broadcast::Receiver<EngineEvent>) -> StreamChunk {
    loop {
        if let EngineEvent::ChunkReady { chunk, .. } = next_event(rx).await {
            return chunk;
        }
    }
}

/// Receive events until the chunk with the given index arrives.
pub async fn chunk_with_index(
    rx: &mut broadcast::Receiver<EngineEvent>,
    index: usize,
) -> StreamChunk {
    loop {
        let chunk = next_chunk(rx).await;
        if chunk.index == index {
            return chunk;
        }
    }
}

/// Whether an event is one of the three terminal notifications.
pub fn is_terminal_event(event: &EngineEvent) -> bool {
    matches!(
        event,
        EngineEvent::StreamCompleted { .. }
            | EngineEvent::StreamError { .. }
            | EngineEvent::StreamCancelled { .. }
    )
}

/// Collect events through the terminal notification (inclusive); the
/// trailing `TypingStopped`, if any, is appended too.
pub async fn collect_through_terminal(
    rx: &mut broadcast::Receiver<EngineEvent>,
) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    loop {
        let event = next_event(rx).await;
        let terminal = is_terminal_event(&event);
        events.push(event);
        if terminal {
            break;
        }
    }
    // Pick up an immediately following typing-stop without blocking long.
    if let Ok(Ok(event)) =
        tokio::time::timeout(Duration::from_millis(100), rx.recv()).await
    {
        events.push(event);
    }
    events
}

/// Drain everything already buffered on the receiver.
pub fn drain_buffered(rx: &mut broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
