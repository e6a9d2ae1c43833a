//! Core types for the G-code transfer protocol
//!
//! This module contains the error taxonomy, configuration and the protocol
//! constants shared by the framer, parser and driver.

pub mod error;
pub mod types;
pub mod serde;

pub use self::error::{Error, ErrorKind, Result};
pub use self::types::{Config, FramingMode, Payload};

/// Default port of the machine-control service
pub const DEFAULT_PORT: u16 = 6280;

/// Read buffer size for framed messages; a frame must end before it fills
pub const MESSAGE_BUFFER_SIZE: usize = 128;

/// Ends status and ack frames, and marks the end of the payload
pub const TERMINATOR: u8 = b'\n';

/// The only state token in which a transfer may start
pub const READY_STATE: &str = "init";

/// Reply sent by the service after the full payload arrived
pub const ACK_MESSAGE: &str = "GCODE_ACK";
