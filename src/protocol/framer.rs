//! Reading newline-terminated messages off the connection.
//!
//! Two strategies are available, selected by [`FramingMode`]:
//!
//! - `SingleRead`: exactly one read of up to `max_message_size` bytes per
//!   message. The frame is whatever precedes the first terminator in that
//!   read; anything after it is dropped. Without a terminator the bytes
//!   read so far are the frame, unless the buffer filled up, which is an
//!   oversized message. A message must therefore arrive within one read.
//! - `Incremental`: bytes are appended to a buffer and scanned with
//!   [`LineCodec`] until a complete frame is available. Leftover bytes stay
//!   buffered for the next message.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::codec::Decoder;

use crate::core::{Config, Error, FramingMode, Result, MESSAGE_BUFFER_SIZE, TERMINATOR};
use crate::diagnostics::{DiagnosticSink, TransferEvent};
use super::codec::LineCodec;

/// Reads framed text messages from a byte stream
#[derive(Debug)]
pub struct MessageFramer {
    mode: FramingMode,
    max_message_size: usize,
    codec: LineCodec,
    /// Bytes carried between reads (incremental mode only)
    pending: BytesMut,
}

impl MessageFramer {
    /// Creates a framer with the given strategy and maximum frame size
    pub fn new(mode: FramingMode, max_message_size: usize) -> Self {
        MessageFramer {
            mode,
            max_message_size,
            codec: LineCodec::new(max_message_size),
            pending: BytesMut::new(),
        }
    }

    /// Creates a framer from the transfer configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.framing, config.max_message_size)
    }

    pub fn mode(&self) -> FramingMode {
        self.mode
    }

    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Number of bytes buffered for the next message
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Reads one message, returning the text preceding the terminator
    ///
    /// No trimming is done; invalid UTF-8 is replaced lossily.
    pub async fn read_message<R>(&mut self, reader: &mut R, sink: &dyn DiagnosticSink) -> Result<String>
    where
        R: AsyncRead + Unpin,
    {
        let result = match self.mode {
            FramingMode::SingleRead => self.read_single(reader, sink).await,
            FramingMode::Incremental => self.read_incremental(reader, sink).await,
        };

        if let Err(e) = &result {
            sink.record(&TransferEvent::ReadFailed {
                error: e.to_string(),
            });
        }
        result
    }

    async fn read_single<R>(&mut self, reader: &mut R, sink: &dyn DiagnosticSink) -> Result<String>
    where
        R: AsyncRead + Unpin,
    {
        let mut buffer = vec![0u8; self.max_message_size];
        let n = read_some(reader, &mut buffer).await?;

        match buffer[..n].iter().position(|b| *b == TERMINATOR) {
            Some(index) => {
                sink.record(&TransferEvent::TerminatorFound { index });
                Ok(String::from_utf8_lossy(&buffer[..index]).into_owned())
            }
            None if n >= self.max_message_size => Err(Error::OversizedMessage {
                limit: self.max_message_size,
            }),
            None => Ok(String::from_utf8_lossy(&buffer[..n]).into_owned()),
        }
    }

    async fn read_incremental<R>(&mut self, reader: &mut R, sink: &dyn DiagnosticSink) -> Result<String>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            if let Some(frame) = self.codec.decode(&mut self.pending)? {
                sink.record(&TransferEvent::TerminatorFound { index: frame.len() });
                return Ok(String::from_utf8_lossy(&frame).into_owned());
            }

            self.pending.reserve(self.max_message_size);
            match reader.read_buf(&mut self.pending).await {
                Ok(0) => return Err(Error::ConnectionClosed),
                Ok(_) => {}
                Err(e) => return Err(Error::connection("failed to read message", e)),
            }
        }
    }
}

impl Default for MessageFramer {
    fn default() -> Self {
        Self::new(FramingMode::default(), MESSAGE_BUFFER_SIZE)
    }
}

/// One underlying read; end of stream is a closed connection
async fn read_some<R>(reader: &mut R, buffer: &mut [u8]) -> Result<usize>
where
    R: AsyncRead + Unpin,
{
    match reader.read(buffer).await {
        Ok(0) if !buffer.is_empty() => Err(Error::ConnectionClosed),
        Ok(n) => Ok(n),
        Err(e) => Err(Error::connection("failed to read message", e)),
    }
}
