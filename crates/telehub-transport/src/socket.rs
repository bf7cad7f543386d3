use std::io::{ErrorKind, Read};
use std::net::{TcpListener, TcpStream};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// Bytes read from a single accepted connection.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Upper bound on how long a single accepted connection may stall a poll.
const CONNECTION_READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Non-blocking TCP listener for line-framed telemetry.
///
/// Each poll accepts at most one pending connection, reads one bounded
/// chunk from it and closes it. No connection outlives a poll.
pub struct SocketListener {
    listener: TcpListener,
    port: u16,
}

impl SocketListener {
    /// Bind on all interfaces at `port` (0 picks an ephemeral port).
    pub fn bind(port: u16) -> Result<Self> {
        debug!(port, "opening socket");

        let listener = TcpListener::bind(("0.0.0.0", port))
            .map_err(|source| TransportError::Bind { port, source })?;
        listener
            .set_nonblocking(true)
            .map_err(|source| TransportError::Bind { port, source })?;
        let port = listener
            .local_addr()
            .map_err(|source| TransportError::Bind { port, source })?
            .port();

        info!(port, "listening on tcp socket");

        Ok(Self { listener, port })
    }

    /// Accept one pending connection, if any, and read up to `max` bytes.
    ///
    /// Returns `Ok(None)` when no client is waiting.
    pub fn poll_chunk(&self, max: usize) -> Result<Option<Vec<u8>>> {
        let (stream, peer) = match self.listener.accept() {
            Ok(accepted) => accepted,
            Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(None),
            Err(err) if err.kind() == ErrorKind::Interrupted => return Ok(None),
            Err(err) => return Err(TransportError::Accept(err)),
        };
        debug!(%peer, "accepted connection");

        let chunk = read_once(stream, max)?;
        Ok(Some(chunk))
    }

    /// The port actually bound.
    pub fn port(&self) -> u16 {
        self.port
    }
}

fn read_once(mut stream: TcpStream, max: usize) -> Result<Vec<u8>> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(CONNECTION_READ_TIMEOUT))?;

    let mut buf = vec![0u8; max];
    let read = match stream.read(&mut buf) {
        Ok(n) => n,
        Err(err)
            if matches!(
                err.kind(),
                ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
            ) =>
        {
            0
        }
        Err(err) => return Err(TransportError::Io(err)),
    };
    buf.truncate(read);
    // Dropping the stream closes the connection.
    Ok(buf)
}

impl Drop for SocketListener {
    fn drop(&mut self) {
        debug!(port = self.port, "closing socket");
    }
}
