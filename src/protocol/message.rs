use std::fmt;

use crate::core::{Error, Result, ACK_MESSAGE};
use crate::diagnostics::{DiagnosticSink, TransferEvent};

/// Key of the status announcement, compared case-insensitively
pub const STATUS_KEY: &str = "STATE:";

/// Prefix of the transfer header line
pub const HEADER_KEY: &str = "GCODE:";

/// Parses a `STATE: <value>` frame into a lower-cased, trimmed state token
///
/// The line is split on single spaces and must yield exactly two tokens, so
/// `STATE:  init` (two spaces) is rejected while `STATE: init\r` is not.
pub fn parse_status(line: &str, sink: &dyn DiagnosticSink) -> Result<String> {
    let tokens: Vec<&str> = line.split(' ').collect();
    if tokens.len() != 2 {
        sink.record(&TransferEvent::UnexpectedTokenCount {
            message: line.to_string(),
        });
        return Err(Error::InvalidStatus(line.to_string()));
    }
    if !tokens[0].eq_ignore_ascii_case(STATUS_KEY) {
        sink.record(&TransferEvent::UnexpectedKey {
            message: line.to_string(),
            key: tokens[0].to_string(),
        });
        return Err(Error::InvalidStatus(line.to_string()));
    }
    Ok(tokens[1].trim().to_lowercase())
}

/// Returns true if the frame is the acknowledgement literal
pub fn is_ack(frame: &str) -> bool {
    frame == ACK_MESSAGE
}

/// Header line announcing the payload: `GCODE: <name>:<len>\n`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferHeader {
    /// Payload name, sent verbatim
    pub name: String,
    /// Payload length in bytes
    pub len: u64,
}

impl TransferHeader {
    pub fn new(name: impl Into<String>, len: u64) -> Self {
        TransferHeader {
            name: name.into(),
            len,
        }
    }

    /// The full header line including its terminator
    pub fn to_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TransferHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}:{}", HEADER_KEY, self.name, self.len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{MemorySink, NullSink};

    #[test]
    fn test_parse_status_normalizes_token() {
        assert_eq!(parse_status("STATE: init", &NullSink).unwrap(), "init");
        assert_eq!(parse_status("state: RUNNING", &NullSink).unwrap(), "running");
        assert_eq!(parse_status("State: Error\r", &NullSink).unwrap(), "error");
        assert_eq!(parse_status("STATE: \tInit\t", &NullSink).unwrap(), "init");
    }

    #[test]
    fn test_parse_status_empty_token() {
        assert_eq!(parse_status("STATE: ", &NullSink).unwrap(), "");
    }

    #[test]
    fn test_parse_status_wrong_token_count() {
        let sink = MemorySink::new();
        for line in ["STATE:init", "STATE:  init", "STATE: init now", " STATE: init", ""] {
            let err = parse_status(line, &sink).unwrap_err();
            assert!(matches!(err, Error::InvalidStatus(ref l) if l == line));
        }
        assert!(sink.contains(|e| matches!(e, TransferEvent::UnexpectedTokenCount { .. })));
    }

    #[test]
    fn test_parse_status_wrong_key() {
        let sink = MemorySink::new();
        let err = parse_status("STATUS: init", &sink).unwrap_err();
        assert!(matches!(err, Error::InvalidStatus(_)));
        assert!(sink.contains(|e| matches!(
            e,
            TransferEvent::UnexpectedKey { key, .. } if key == "STATUS:"
        )));

        assert!(parse_status("STATE init", &NullSink).is_err());
    }

    #[test]
    fn test_header_line() {
        let header = TransferHeader::new("parts/bracket.nc", 10);
        assert_eq!(header.to_line(), "GCODE: parts/bracket.nc:10\n");
    }

    #[test]
    fn test_is_ack() {
        assert!(is_ack("GCODE_ACK"));
        assert!(!is_ack("DONE"));
        assert!(!is_ack("GCODE_ACK\r"));
        assert!(!is_ack("gcode_ack"));
    }
}
