//! One-shot TCP delivery to the collector.
//!
//! One measurement cycle opens at most one connection per attempt, writes a
//! single packet and closes. Nothing is read back.

use std::io::{self, ErrorKind, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("could not resolve {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("no address found for {host}:{port}")]
    NoAddress { host: String, port: u16 },
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("send failed after {sent} of {total} bytes: {source}")]
    Send {
        sent: usize,
        total: usize,
        #[source]
        source: io::Error,
    },
    #[error("connection is closed")]
    Closed,
}

/// Write every byte of `bytes`, re-issuing partial writes.
///
/// Only returns `Ok` once the whole buffer has been accepted.
pub fn send_all<W: Write + ?Sized>(writer: &mut W, bytes: &[u8]) -> Result<(), TransportError> {
    let total = bytes.len();
    let mut sent = 0usize;
    while sent < total {
        match writer.write(&bytes[sent..]) {
            Ok(0) => {
                return Err(TransportError::Send {
                    sent,
                    total,
                    source: io::Error::from(ErrorKind::WriteZero),
                })
            }
            Ok(n) => sent += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(source) => return Err(TransportError::Send { sent, total, source }),
        }
    }
    writer
        .flush()
        .map_err(|source| TransportError::Send { sent, total, source })
}

pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Connection, TransportError> {
    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| TransportError::Resolve {
            host: host.to_string(),
            port,
            source,
        })?;

    let mut last_err = None;
    for addr in addrs {
        match open(addr, timeout) {
            Ok(stream) => {
                info!("Connected to collector at {addr}");
                return Ok(Connection::new(stream));
            }
            Err(source) => {
                warn!("Connect to {addr} failed: {source}");
                last_err = Some(TransportError::Connect { addr, source });
            }
        }
    }
    Err(last_err.unwrap_or_else(|| TransportError::NoAddress {
        host: host.to_string(),
        port,
    }))
}

fn open(addr: SocketAddr, timeout: Duration) -> io::Result<TcpStream> {
    let stream = TcpStream::connect_timeout(&addr, timeout)?;
    stream.set_write_timeout(Some(timeout))?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// An open stream to the collector. Closing is idempotent; sends on a closed
/// connection fail with [`TransportError::Closed`].
#[derive(Debug)]
pub struct Connection<S = TcpStream> {
    stream: Option<S>,
}

impl<S: Write> Connection<S> {
    pub fn new(stream: S) -> Self {
        Self { stream: Some(stream) }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    pub fn send_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;
        send_all(stream, bytes)
    }

    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            debug!("Closing collector connection");
            drop(stream);
        }
    }
}
