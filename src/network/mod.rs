//! Connecting to the machine-control service and running a transfer
//!
//! [`send_file`] is the whole client: it checks the file, resolves and dials
//! the service, then hands the connection and file to a
//! [`TransferDriver`]. [`transfer`] does the last step for a caller that
//! already holds a connection.

mod connection;

pub use self::connection::{connect, resolve};

use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::core::{Config, Error, Payload, Result};
use crate::diagnostics::DiagnosticSink;
use crate::protocol::{TransferDriver, TransferReport};

/// Sends the file at `path` to the service described by `config`
pub async fn send_file<D>(config: &Config, path: impl AsRef<Path>, sink: D) -> Result<TransferReport>
where
    D: DiagnosticSink,
{
    config.validate()?;
    let path = path.as_ref();
    // The name goes on the wire verbatim, so it must be valid UTF-8
    let name = path.to_str().ok_or_else(|| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} is not a valid UTF-8 path", path.display()),
        ))
    })?;

    let metadata = tokio::fs::metadata(path).await?;
    if !metadata.is_file() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} is not a regular file", path.display()),
        )));
    }
    let file = File::open(path).await?;
    let payload = Payload::new(name, metadata.len(), file);

    let addr = resolve(&config.host, config.port).await?;
    let stream = connect(addr, config.connect_timeout, &sink).await?;

    transfer(stream, payload, config, sink).await
}

/// Runs one transfer over an already established connection
pub async fn transfer<S, R, D>(
    stream: S,
    payload: Payload<R>,
    config: &Config,
    sink: D,
) -> Result<TransferReport>
where
    S: AsyncRead + AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
    D: DiagnosticSink,
{
    TransferDriver::from_config(stream, payload, config, sink)
        .run()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;
    use crate::diagnostics::{MemorySink, NullSink, TransferEvent};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::{TcpListener, TcpStream};

    static FILE_COUNTER: AtomicUsize = AtomicUsize::new(0);

    /// Writes `contents` to a fresh file under the system temp dir
    fn gcode_file(contents: &[u8]) -> PathBuf {
        let n = FILE_COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "gcode-sender-{}-{}.nc",
            std::process::id(),
            n
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// What the fake service saw: the header line and payload, if any
    struct Received {
        header: Option<String>,
        payload: Vec<u8>,
    }

    async fn fake_service(listener: TcpListener, greeting: &'static [u8], reply: &'static [u8]) -> Received {
        let (socket, _) = listener.accept().await.unwrap();
        let mut socket = BufReader::new(socket);
        socket.get_mut().write_all(greeting).await.unwrap();

        let mut header = String::new();
        if socket.read_line(&mut header).await.unwrap() == 0 {
            return Received { header: None, payload: Vec::new() };
        }
        let len: usize = header.trim_end().rsplit(':').next().unwrap().parse().unwrap();
        let mut payload = vec![0u8; len];
        socket.read_exact(&mut payload).await.unwrap();
        let mut terminator = [0u8; 1];
        socket.read_exact(&mut terminator).await.unwrap();
        assert_eq!(terminator[0], b'\n');

        socket.get_mut().write_all(reply).await.unwrap();
        Received { header: Some(header), payload }
    }

    fn local_config(listener: &TcpListener) -> Config {
        let addr = listener.local_addr().unwrap();
        Config {
            host: addr.ip().to_string(),
            port: addr.port(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_ten_byte_file_is_acknowledged() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = local_config(&listener);
        let service = tokio::spawn(fake_service(listener, b"STATE: init\n", b"GCODE_ACK\n"));

        let path = gcode_file(b"G0 X0 Y0\n\n");
        let sink = MemorySink::new();
        let report = send_file(&config, &path, &sink).await.unwrap();
        assert_eq!(report.status, "init");
        assert_eq!(report.bytes_sent, 10);

        let received = service.await.unwrap();
        assert_eq!(
            received.header.unwrap(),
            format!("GCODE: {}:10\n", path.display())
        );
        assert_eq!(received.payload, b"G0 X0 Y0\n\n");
        assert!(sink.contains(|e| matches!(e, TransferEvent::Connected { .. })));
        assert!(sink.contains(|e| matches!(e, TransferEvent::Done { size: 10 })));

        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn test_running_machine_gets_no_header() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = local_config(&listener);
        let service = tokio::spawn(fake_service(listener, b"STATE: running\n", b"GCODE_ACK\n"));

        let path = gcode_file(b"M3 S1000\n");
        let err = send_file(&config, &path, NullSink).await.unwrap_err();
        assert!(matches!(err, Error::UnexpectedState(ref s) if s == "running"));

        let received = service.await.unwrap();
        assert!(received.header.is_none());
        assert!(received.payload.is_empty());

        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn test_wrong_reply_is_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = local_config(&listener);
        let service = tokio::spawn(fake_service(listener, b"STATE: INIT\n", b"DONE\n"));

        let path = gcode_file(b"0123456789");
        let err = send_file(&config, &path, NullSink).await.unwrap_err();
        assert!(matches!(err, Error::MissingAck(ref m) if m == "DONE"));
        assert_eq!(err.kind(), ErrorKind::Protocol);

        // The payload still went out in full
        let received = service.await.unwrap();
        assert_eq!(received.payload, b"0123456789");

        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn test_oversized_greeting() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = local_config(&listener);
        let service = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(&[b'x'; 128]).await.unwrap();
            let mut rest = Vec::new();
            socket.read_to_end(&mut rest).await.unwrap();
            rest
        });

        let path = gcode_file(b"G28\n");
        let err = send_file(&config, &path, NullSink).await.unwrap_err();
        assert!(matches!(err, Error::OversizedMessage { limit: 128 }));

        // Nothing, header included, was written before the abort
        assert!(service.await.unwrap().is_empty());

        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = send_file(&Config::default(), "/nonexistent/part.nc", NullSink)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[tokio::test]
    async fn test_directory_is_rejected() {
        let err = send_file(&Config::default(), std::env::temp_dir(), NullSink)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_utf8_path_is_rejected() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let path = std::env::temp_dir().join(OsStr::from_bytes(b"gcode-send-\xff.nc"));
        std::fs::write(&path, b"G0 X0\n").unwrap();

        let sink = MemorySink::new();
        let err = send_file(&Config::default(), &path, &sink).await.unwrap_err();
        std::fs::remove_file(&path).ok();

        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("UTF-8"));
        assert!(!sink.contains(|e| matches!(e, TransferEvent::Connecting { .. })));
    }

    #[tokio::test]
    async fn test_invalid_config() {
        let config = Config {
            port: 0,
            ..Config::default()
        };
        let err = send_file(&config, "part.nc", NullSink).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[tokio::test]
    async fn test_transfer_over_existing_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let service = tokio::spawn(fake_service(listener, b"state: init\r\n", b"GCODE_ACK\n"));

        let stream = TcpStream::connect(addr).await.unwrap();
        let payload = Payload::new("inline.nc", 3, &b"G90"[..]);
        let report = transfer(stream, payload, &Config::default(), NullSink)
            .await
            .unwrap();
        assert_eq!(report.bytes_sent, 3);

        let received = service.await.unwrap();
        assert_eq!(received.header.as_deref(), Some("GCODE: inline.nc:3\n"));
    }
}
