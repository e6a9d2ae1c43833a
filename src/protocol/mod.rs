//! Transfer protocol implementation module
//!
//! This module defines the line-based handshake: framing of status and ack
//! messages, status parsing, the transfer header, and the state machine
//! that drives one transfer.

pub mod codec;
pub mod framer;
pub mod message;
pub mod state;

pub use self::codec::LineCodec;
pub use self::framer::MessageFramer;
pub use self::message::{is_ack, parse_status, TransferHeader, HEADER_KEY, STATUS_KEY};
pub use self::state::{ProtocolConfig, StepOutcome, TransferDriver, TransferReport, TransferState};
