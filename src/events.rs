//! Observability Event Sink
//!
//! The search core and the manager publish node lifecycle notifications for
//! external tooling (visualization, progress reporting). Emission is fire and
//! forget: a missing or slow listener never blocks or fails the search.

use tokio::sync::mpsc;

/// Node lifecycle notifications published by a participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent<P> {
    /// A node entered the open frontier.
    NodeOpened { point: P },
    /// A node left the frontier for good (expanded, or its responsibility
    /// resolved by a merged result).
    NodeClosed { point: P },
    /// A frontier node was handed to a coworker and is no longer open locally.
    NodeDistributed { point: P },
    /// A goal node was reached.
    SolutionFound { point: P },
}

/// Sender half of the event sink.
///
/// Wraps an unbounded channel so `emit` never waits; when no listener is
/// attached every event is dropped on the floor.
#[derive(Clone)]
pub struct EventEmitter<P> {
    tx: Option<mpsc::UnboundedSender<SearchEvent<P>>>,
}

impl<P> EventEmitter<P> {
    /// An emitter with no listener; every event is discarded.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Creates an emitter and the receiver consuming its events.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SearchEvent<P>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Publishes an event. Closed or missing listeners are ignored.
    pub fn emit(&self, event: SearchEvent<P>) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
