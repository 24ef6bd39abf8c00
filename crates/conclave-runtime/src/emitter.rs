//! Per-session event fan-out for viewers.
//!
//! Viewers may join at any time and only see what is emitted afterwards.
//! Once `session_complete` goes out the channel is sealed, so it is always
//! the last event a viewer receives.

use std::sync::atomic::{AtomicBool, Ordering};

use conclave_core::events::SessionEvent;
use tokio::sync::broadcast;
use tracing::trace;

const DEFAULT_CAPACITY: usize = 1024;

/// Broadcast channel of one session's [`SessionEvent`]s.
///
/// `emit` never waits; a receiver that falls behind by more than the
/// capacity observes `Lagged` instead of slowing agents down.
pub struct EventEmitter {
    tx: broadcast::Sender<SessionEvent>,
    sealed: AtomicBool,
}

impl EventEmitter {
    /// Emitter with room for 1024 undelivered events per receiver.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Emitter with a custom per-receiver backlog.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            sealed: AtomicBool::new(false),
        }
    }

    /// Send `event` to current viewers and return how many got it.
    ///
    /// Events after `session_complete` are dropped.
    pub fn emit(&self, event: SessionEvent) -> usize {
        if self.sealed.load(Ordering::SeqCst) {
            trace!(event = event.event_type(), "dropping event after session_complete");
            return 0;
        }
        if matches!(event, SessionEvent::SessionComplete { .. }) {
            self.sealed.store(true, Ordering::SeqCst);
        }
        self.tx.send(event).unwrap_or(0)
    }

    /// Receive everything emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}
