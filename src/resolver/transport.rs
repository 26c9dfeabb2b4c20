//! One-shot UDP exchange with a remote nameserver: send a single
//! query datagram, wait for a single reply datagram, under a bounded
//! timeout so one unresponsive server cannot stall a resolution.

use std::io;
use std::net::Ipv4Addr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;

/// Why an exchange produced no response.  Timeouts are routine (the
/// engine moves on to the next candidate); network errors are worth
/// logging more loudly.
#[derive(Debug)]
pub enum TransportError {
    Timeout,
    Network(io::Error),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Timeout => write!(f, "timed out waiting for a response"),
            TransportError::Network(err) => write!(f, "network error: {err}"),
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        TransportError::Network(err)
    }
}

/// Send `query` to `(address, port)` and return the raw bytes of the
/// first reply datagram.
pub async fn exchange(
    address: Ipv4Addr,
    port: u16,
    query: &[u8],
    wait: Duration,
) -> Result<Vec<u8>, TransportError> {
    match timeout(wait, exchange_notimeout(address, port, query)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout),
    }
}

/// Timeout-less version of `exchange`.
async fn exchange_notimeout(
    address: Ipv4Addr,
    port: u16,
    query: &[u8],
) -> Result<Vec<u8>, TransportError> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.connect((address, port)).await?;
    socket.send(query).await?;

    let mut buf = vec![0u8; 512];
    let received = socket.recv(&mut buf).await?;
    buf.truncate(received);

    Ok(buf)
}
