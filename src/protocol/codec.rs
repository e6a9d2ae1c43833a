use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::core::{Error, TERMINATOR};
use super::message::TransferHeader;

/// Newline-delimited frame codec with a bounded frame length
///
/// Unlike the single-read framer this keeps unconsumed bytes in the
/// caller's buffer, so frames split across reads are reassembled and a
/// frame following another in the same read is not lost.
#[derive(Debug, Clone)]
pub struct LineCodec {
    max_length: usize,
}

impl LineCodec {
    /// Creates a codec rejecting frames whose terminator is not within
    /// the first `max_length` bytes
    pub fn new(max_length: usize) -> Self {
        LineCodec { max_length }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl Decoder for LineCodec {
    type Item = BytesMut;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let window = src.len().min(self.max_length);
        if let Some(index) = src[..window].iter().position(|b| *b == TERMINATOR) {
            let mut frame = src.split_to(index + 1);
            frame.truncate(index);
            return Ok(Some(frame));
        }

        if src.len() >= self.max_length {
            src.clear();
            return Err(Error::OversizedMessage {
                limit: self.max_length,
            });
        }

        // Need more data
        Ok(None)
    }
}

impl Encoder<&TransferHeader> for LineCodec {
    type Error = Error;

    fn encode(&mut self, item: &TransferHeader, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let line = item.to_line();
        dst.reserve(line.len());
        dst.put_slice(line.as_bytes());
        Ok(())
    }
}
