//! Diagnostic events emitted during a transfer
//!
//! The framer and the driver never log directly. They report
//! [`TransferEvent`]s to a [`DiagnosticSink`] handed to them by the caller.
//! [`TracingSink`] forwards events to `tracing` with structured fields,
//! [`MemorySink`] keeps them for inspection.

use std::sync::{Arc, Mutex};

use tracing::{debug, error, info, warn};

/// Something observable that happened during a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    /// About to dial the service
    Connecting { address: String },
    /// TCP connection established
    Connected { address: String },
    /// Terminator found while scanning a frame
    TerminatorFound { index: usize },
    /// A framed read failed
    ReadFailed { error: String },
    /// Status line did not split into exactly two tokens
    UnexpectedTokenCount { message: String },
    /// Status line key was not `STATE:`
    UnexpectedKey { message: String, key: String },
    /// Status token parsed from the greeting
    StateReceived { state: String },
    /// Driver moved between states
    Transition { from: &'static str, to: &'static str },
    /// Header line about to be written
    SendingHeader { header: String },
    /// Payload copy starting
    SendingPayload { size: u64 },
    /// Payload copy finished
    PayloadSent { size: u64 },
    /// Flushing buffered output to the network
    Flushing,
    /// Reply other than the acknowledgement
    AckMismatch { message: String },
    /// The transfer was aborted in the given state
    Aborted { state: &'static str, error: String },
    /// The transfer completed
    Done { size: u64 },
}

/// Receiver of transfer diagnostics; purely observational
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, event: &TransferEvent);
}

impl<T: DiagnosticSink + ?Sized> DiagnosticSink for &T {
    fn record(&self, event: &TransferEvent) {
        (**self).record(event)
    }
}

impl<T: DiagnosticSink + ?Sized> DiagnosticSink for Arc<T> {
    fn record(&self, event: &TransferEvent) {
        (**self).record(event)
    }
}

/// Forwards events to the `tracing` subscriber as structured log records
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, event: &TransferEvent) {
        match event {
            TransferEvent::Connecting { address } => debug!(address = %address, "connecting"),
            TransferEvent::Connected { address } => debug!(address = %address, "connected"),
            TransferEvent::TerminatorFound { index } => {
                debug!(index = *index, "found termination character")
            }
            TransferEvent::ReadFailed { error } => {
                error!(error = %error, "failed to read message")
            }
            TransferEvent::UnexpectedTokenCount { message } => {
                error!(message = %message, "unexpected number of tokens")
            }
            TransferEvent::UnexpectedKey { message, key } => {
                error!(message = %message, key = %key, "unexpected message key")
            }
            TransferEvent::StateReceived { state } => debug!(state = %state, "received state"),
            TransferEvent::Transition { from, to } => {
                debug!(state_from = *from, state_to = *to, "transfer state transition")
            }
            TransferEvent::SendingHeader { header } => {
                debug!(header = %header.trim_end(), "sending header")
            }
            TransferEvent::SendingPayload { size } => debug!(size = *size, "sending gcode"),
            TransferEvent::PayloadSent { size } => debug!(size = *size, "sent gcode"),
            TransferEvent::Flushing => debug!("flushing"),
            TransferEvent::AckMismatch { message } => {
                error!(message = %message, "did not receive ack")
            }
            TransferEvent::Aborted { state, error } => {
                warn!(state = *state, error = %error, "transfer aborted")
            }
            TransferEvent::Done { size } => info!(size = *size, "done"),
        }
    }
}

/// Keeps every recorded event in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<TransferEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the events recorded so far
    pub fn events(&self) -> Vec<TransferEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Returns true if any recorded event satisfies the predicate
    pub fn contains(&self, predicate: impl Fn(&TransferEvent) -> bool) -> bool {
        self.events().iter().any(predicate)
    }
}

impl DiagnosticSink for MemorySink {
    fn record(&self, event: &TransferEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn record(&self, _event: &TransferEvent) {}
}
