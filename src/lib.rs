//! gcode_sender: hand a G-code file to a machine-control service over TCP
//!
//! The service greets with `STATE: <token>`. A transfer only starts in the
//! `init` state: the client sends `GCODE: <name>:<len>`, the raw file bytes
//! and a newline, then waits for `GCODE_ACK`. Any deviation aborts the
//! attempt; nothing is retried.
pub mod core;
pub mod diagnostics;
pub mod network;
pub mod protocol;

// Re-export commonly used items
pub use crate::core::{Config, Error, ErrorKind, FramingMode, Payload, Result};
pub use crate::diagnostics::{DiagnosticSink, MemorySink, TracingSink, TransferEvent};
pub use crate::network::{send_file, transfer};
pub use crate::protocol::{TransferDriver, TransferReport, TransferState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
