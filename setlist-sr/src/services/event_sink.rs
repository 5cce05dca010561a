//! Session event emission
//!
//! The orchestrator talks to its SSE stream through a bounded channel. A
//! full channel applies backpressure to the pipeline instead of buffering
//! unboundedly, and a closed channel or cancelled token turns every emit
//! into `false`, which the orchestrator treats as implicit cancellation.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use setlist_common::events::PlaylistEvent;

/// Bounded channel size between the orchestrator and the SSE stream
pub const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Producer handle for one session's event stream
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<PlaylistEvent>,
    cancel: CancellationToken,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<PlaylistEvent>, cancel: CancellationToken) -> Self {
        Self { tx, cancel }
    }

    /// Send one event to the consumer.
    ///
    /// Returns false when the consumer is gone (cancelled token or closed
    /// channel); the caller must then stop producing. May wait when the
    /// channel is full.
    pub async fn emit(&self, event: PlaylistEvent) -> bool {
        let kind = event.event_type();
        if self.cancel.is_cancelled() {
            tracing::debug!(kind, "Dropping event: session cancelled");
            return false;
        }

        tokio::select! {
            _ = self.cancel.cancelled() => {
                tracing::debug!(kind, "Session cancelled while emitting");
                false
            }
            sent = self.tx.send(event) => match sent {
                Ok(()) => true,
                Err(_) => {
                    tracing::debug!(kind, "Event channel closed by consumer");
                    false
                }
            },
        }
    }

    /// Send the terminal event regardless of cancellation state.
    ///
    /// A cancelled session may still have a live consumer waiting for the
    /// closing complete/error event; only a closed channel makes this fail.
    pub async fn emit_final(&self, event: PlaylistEvent) -> bool {
        match self.tx.send(event).await {
            Ok(()) => true,
            Err(_) => {
                tracing::debug!("Event channel closed before terminal event");
                false
            }
        }
    }

    /// Cancellation state, for checks between emissions
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
