use std::future::Future;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio_util::codec::Encoder;

use crate::core::{Config, Error, Payload, Result, READY_STATE, TERMINATOR};
use crate::diagnostics::{DiagnosticSink, TransferEvent};
use super::codec::LineCodec;
use super::framer::MessageFramer;
use super::message::{is_ack, parse_status, TransferHeader};

/// Size of the chunks the payload is copied in
const COPY_CHUNK_SIZE: usize = 8 * 1024;

/// State of one transfer attempt
///
/// Each non-terminal state names the step the driver performs while in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferState {
    /// Connection open, waiting for the status line
    Connected,
    /// Status received, about to be validated
    StatusChecked {
        /// Normalized state token reported by the service
        status: String,
    },
    /// Writing the transfer header
    HeaderSent,
    /// Copying the payload
    Streaming,
    /// Writing the terminator byte and flushing
    TerminatorSent,
    /// Waiting for the acknowledgement frame
    AwaitingAck,
    /// Transfer acknowledged
    Done,
    /// Transfer failed
    Aborted {
        /// State the failure happened in
        from: &'static str,
    },
}

/// Result of performing the step of the current state
#[derive(Debug)]
pub enum StepOutcome {
    /// Status token parsed from the greeting
    Status(String),
    /// The step finished without producing data
    Completed,
    /// Frame read while awaiting the acknowledgement
    Reply(String),
    /// The step failed
    Failed(Error),
}

impl StepOutcome {
    fn name(&self) -> &'static str {
        match self {
            StepOutcome::Status(_) => "Status",
            StepOutcome::Completed => "Completed",
            StepOutcome::Reply(_) => "Reply",
            StepOutcome::Failed(_) => "Failed",
        }
    }
}

impl TransferState {
    pub fn name(&self) -> &'static str {
        match self {
            TransferState::Connected => "Connected",
            TransferState::StatusChecked { .. } => "StatusChecked",
            TransferState::HeaderSent => "HeaderSent",
            TransferState::Streaming => "Streaming",
            TransferState::TerminatorSent => "TerminatorSent",
            TransferState::AwaitingAck => "AwaitingAck",
            TransferState::Done => "Done",
            TransferState::Aborted { .. } => "Aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferState::Done | TransferState::Aborted { .. })
    }

    /// Computes the next state from the outcome of the current step
    ///
    /// Returns the error that aborted the transfer alongside `Aborted`.
    /// Terminal states absorb every outcome.
    pub fn transition(self, outcome: StepOutcome) -> (TransferState, Option<Error>) {
        use TransferState::*;

        match (self, outcome) {
            (state @ (Done | Aborted { .. }), _) => (state, None),

            (state, StepOutcome::Failed(error)) => (Aborted { from: state.name() }, Some(error)),

            (Connected, StepOutcome::Status(status)) => (StatusChecked { status }, None),

            (StatusChecked { status }, StepOutcome::Completed) => {
                if status == READY_STATE {
                    (HeaderSent, None)
                } else {
                    (
                        Aborted { from: "StatusChecked" },
                        Some(Error::UnexpectedState(status)),
                    )
                }
            }

            (HeaderSent, StepOutcome::Completed) => (Streaming, None),
            (Streaming, StepOutcome::Completed) => (TerminatorSent, None),
            (TerminatorSent, StepOutcome::Completed) => (AwaitingAck, None),

            (AwaitingAck, StepOutcome::Reply(message)) => {
                if is_ack(&message) {
                    (Done, None)
                } else {
                    (Aborted { from: "AwaitingAck" }, Some(Error::MissingAck(message)))
                }
            }

            (state, outcome) => {
                let from = state.name();
                (
                    Aborted { from },
                    Some(Error::invalid_state(format!(
                        "unexpected {} outcome in state {}",
                        outcome.name(),
                        from
                    ))),
                )
            }
        }
    }
}

/// Deadlines applied by the driver
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProtocolConfig {
    /// Deadline for each framed read
    pub read_timeout: Option<Duration>,
    /// Deadline for each individual write and for the final flush
    pub write_timeout: Option<Duration>,
}

impl From<&Config> for ProtocolConfig {
    fn from(config: &Config) -> Self {
        ProtocolConfig {
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
        }
    }
}

/// Summary of a completed transfer
#[derive(Debug, Clone, PartialEq)]
pub struct TransferReport {
    /// State token reported before the transfer
    pub status: String,
    /// Payload bytes written, excluding header and terminator
    pub bytes_sent: u64,
    /// Wall time from first read to acknowledgement
    pub elapsed: Duration,
}

/// Drives one transfer over an established connection
///
/// The driver owns the connection and the payload reader; both are
/// released when [`TransferDriver::run`] returns, whatever the outcome.
pub struct TransferDriver<S, R, D> {
    stream: BufWriter<S>,
    payload: Payload<R>,
    framer: MessageFramer,
    codec: LineCodec,
    config: ProtocolConfig,
    sink: D,
    status: Option<String>,
    bytes_sent: u64,
}

impl<S, R, D> TransferDriver<S, R, D>
where
    S: AsyncRead + AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
    D: DiagnosticSink,
{
    pub fn new(
        stream: S,
        payload: Payload<R>,
        framer: MessageFramer,
        config: ProtocolConfig,
        sink: D,
    ) -> Self {
        let codec = LineCodec::new(framer.max_message_size());
        TransferDriver {
            stream: BufWriter::new(stream),
            payload,
            framer,
            codec,
            config,
            sink,
            status: None,
            bytes_sent: 0,
        }
    }

    /// Creates a driver using the framing and deadlines of `config`
    pub fn from_config(stream: S, payload: Payload<R>, config: &Config, sink: D) -> Self {
        Self::new(
            stream,
            payload,
            MessageFramer::from_config(config),
            ProtocolConfig::from(config),
            sink,
        )
    }

    /// Runs the state machine to a terminal state
    pub async fn run(mut self) -> Result<TransferReport> {
        let started = Instant::now();
        let mut state = TransferState::Connected;

        loop {
            let outcome = self.step(&state).await;
            let from = state.name();
            let (next, error) = state.transition(outcome);
            self.sink.record(&TransferEvent::Transition {
                from,
                to: next.name(),
            });

            match (next, error) {
                (_, Some(error)) => {
                    if let Error::MissingAck(message) = &error {
                        self.sink.record(&TransferEvent::AckMismatch {
                            message: message.clone(),
                        });
                    }
                    self.sink.record(&TransferEvent::Aborted {
                        state: from,
                        error: error.to_string(),
                    });
                    return Err(error);
                }
                (TransferState::Done, None) => {
                    self.sink.record(&TransferEvent::Done {
                        size: self.bytes_sent,
                    });
                    return Ok(TransferReport {
                        status: self.status.take().unwrap_or_default(),
                        bytes_sent: self.bytes_sent,
                        elapsed: started.elapsed(),
                    });
                }
                (next, None) if next.is_terminal() => {
                    return Err(Error::invalid_state(format!(
                        "transfer stopped in {} without an error",
                        next.name()
                    )));
                }
                (next, None) => state = next,
            }
        }
    }

    async fn step(&mut self, state: &TransferState) -> StepOutcome {
        let result = match state {
            TransferState::Connected => self.read_status().await.map(StepOutcome::Status),
            TransferState::StatusChecked { .. } => Ok(StepOutcome::Completed),
            TransferState::HeaderSent => self.send_header().await.map(|_| StepOutcome::Completed),
            TransferState::Streaming => self.send_payload().await.map(|_| StepOutcome::Completed),
            TransferState::TerminatorSent => {
                self.send_terminator().await.map(|_| StepOutcome::Completed)
            }
            TransferState::AwaitingAck => {
                let timeout = self.config.read_timeout;
                let reader = self.stream.get_mut();
                with_deadline(timeout, "read ack", self.framer.read_message(reader, &self.sink))
                    .await
                    .map(StepOutcome::Reply)
            }
            TransferState::Done | TransferState::Aborted { .. } => Err(Error::invalid_state(
                format!("no step in terminal state {}", state.name()),
            )),
        };

        result.unwrap_or_else(StepOutcome::Failed)
    }

    async fn read_status(&mut self) -> Result<String> {
        let timeout = self.config.read_timeout;
        let reader = self.stream.get_mut();
        let line =
            with_deadline(timeout, "read status", self.framer.read_message(reader, &self.sink))
                .await?;

        let status = parse_status(&line, &self.sink)?;
        self.sink.record(&TransferEvent::StateReceived {
            state: status.clone(),
        });
        self.status = Some(status.clone());
        Ok(status)
    }

    async fn send_header(&mut self) -> Result<()> {
        let header = TransferHeader::new(self.payload.name.clone(), self.payload.len);
        let mut line = BytesMut::new();
        self.codec.encode(&header, &mut line)?;

        self.sink.record(&TransferEvent::SendingHeader {
            header: header.to_line(),
        });
        let timeout = self.config.write_timeout;
        write_all_within(&mut self.stream, &line, timeout, "send header", "failed sending header").await
    }

    async fn send_payload(&mut self) -> Result<()> {
        let declared = self.payload.len;
        self.sink.record(&TransferEvent::SendingPayload { size: declared });

        let mut chunk = vec![0u8; COPY_CHUNK_SIZE];
        let mut sent: u64 = 0;
        loop {
            let n = self.payload.reader.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            write_all_within(
                &mut self.stream,
                &chunk[..n],
                self.config.write_timeout,
                "send payload",
                "failed sending file over connection",
            )
            .await?;
            sent += n as u64;
        }

        self.bytes_sent = sent;
        self.sink.record(&TransferEvent::PayloadSent { size: sent });
        if sent != declared {
            return Err(Error::PayloadLength { declared, sent });
        }
        Ok(())
    }

    async fn send_terminator(&mut self) -> Result<()> {
        let timeout = self.config.write_timeout;
        write_all_within(
            &mut self.stream,
            &[TERMINATOR],
            timeout,
            "send terminator",
            "failed sending termination signal",
        )
        .await?;

        self.sink.record(&TransferEvent::Flushing);
        let stream = &mut self.stream;
        with_deadline(timeout, "flush", async {
            stream
                .flush()
                .await
                .map_err(|e| Error::connection("failed flushing connection", e))
        })
        .await
    }
}

/// Writes all of `bytes`; the deadline bounds this one write, not the step
async fn write_all_within<W>(
    writer: &mut W,
    bytes: &[u8],
    deadline: Option<Duration>,
    operation: &'static str,
    context: &'static str,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    with_deadline(deadline, operation, async {
        writer
            .write_all(bytes)
            .await
            .map_err(|e| Error::connection(context, e))
    })
    .await
}

/// Awaits `fut`, failing with a timeout error once `deadline` elapses
async fn with_deadline<T, F>(deadline: Option<Duration>, operation: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match deadline {
        None => fut.await,
        Some(after) => tokio::time::timeout(after, fut)
            .await
            .map_err(|_| Error::Timeout { operation, after })?,
    }
}
