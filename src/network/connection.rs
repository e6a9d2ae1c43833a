use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{lookup_host, TcpStream};

use crate::core::{Error, Result};
use crate::diagnostics::{DiagnosticSink, TransferEvent};

/// Resolves `host:port` to the first address returned by the system resolver
pub async fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    let addrs = lookup_host((host, port))
        .await
        .map_err(|e| Error::connection(format!("could not resolve address {}", host), e))?;
    first_address(host, addrs)
}

fn first_address(host: &str, mut addrs: impl Iterator<Item = SocketAddr>) -> Result<SocketAddr> {
    addrs.next().ok_or_else(|| {
        Error::connection(
            format!("could not resolve address {}", host),
            io::Error::new(io::ErrorKind::NotFound, "no addresses returned"),
        )
    })
}

/// Opens a TCP connection, optionally bounded by `timeout`
pub async fn connect(
    addr: SocketAddr,
    timeout: Option<Duration>,
    sink: &dyn DiagnosticSink,
) -> Result<TcpStream> {
    sink.record(&TransferEvent::Connecting {
        address: addr.to_string(),
    });

    let dial = TcpStream::connect(addr);
    let stream = match timeout {
        None => dial.await,
        Some(after) => tokio::time::timeout(after, dial)
            .await
            .map_err(|_| Error::Timeout {
                operation: "connect",
                after,
            })?,
    }
    .map_err(|e| Error::connection(format!("failed to connect to server {}", addr), e))?;

    stream
        .set_nodelay(true)
        .map_err(|e| Error::connection("failed to configure socket", e))?;

    sink.record(&TransferEvent::Connected {
        address: addr.to_string(),
    });
    Ok(stream)
}
