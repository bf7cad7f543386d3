use bytes::{Buf, BytesMut};
use telehub_transport::SerialLink;
use tracing::warn;

use crate::error::{FrameError, Result};

/// Line delimiter used by every line-framed transport.
pub const DELIMITER: &[u8] = b"\r\n";

/// Default cap on buffered bytes without a delimiter.
pub const DEFAULT_MAX_LINE: usize = 4 * 1024;

const READ_CHUNK_SIZE: usize = 512;

/// Accumulates bytes and yields complete CR-LF terminated lines.
///
/// Partial lines stay buffered until their delimiter arrives.
#[derive(Debug)]
pub struct LineBuffer {
    buf: BytesMut,
    max_line: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::with_max_line(DEFAULT_MAX_LINE)
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            max_line,
        }
    }

    /// Append received bytes.
    ///
    /// If the buffer exceeds the line limit with no delimiter in sight the
    /// buffered bytes are dropped so the stream can resynchronise.
    pub fn extend(&mut self, bytes: &[u8]) -> Result<()> {
        self.buf.extend_from_slice(bytes);
        if self.buf.len() > self.max_line && find_delimiter(&self.buf).is_none() {
            let size = self.buf.len();
            self.buf.clear();
            return Err(FrameError::LineTooLong {
                size,
                max: self.max_line,
            });
        }
        Ok(())
    }

    /// Take the first complete line, leaving the remainder buffered.
    pub fn next_line(&mut self) -> Option<String> {
        let end = find_delimiter(&self.buf)?;
        let line = self.buf.split_to(end);
        self.buf.advance(DELIMITER.len());
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Whether any byte has been seen that matches `pred`.
    pub fn contains(&self, pred: impl Fn(u8) -> bool) -> bool {
        self.buf.iter().any(|&b| pred(b))
    }

    pub fn has_line(&self) -> bool {
        find_delimiter(&self.buf).is_some()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

fn find_delimiter(buf: &[u8]) -> Option<usize> {
    buf.windows(DELIMITER.len()).position(|w| w == DELIMITER)
}

/// Reads CR-LF lines from a non-blocking [`SerialLink`].
pub struct LineReader<T> {
    inner: T,
    buf: LineBuffer,
}

impl<T: SerialLink> LineReader<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: LineBuffer::new(),
        }
    }

    /// Pull pending bytes and return one complete line if available.
    ///
    /// Never blocks. Returns `Ok(None)` while a line is incomplete.
    pub fn poll_line(&mut self) -> Result<Option<String>> {
        self.fill()?;
        Ok(self.buf.next_line())
    }

    /// Pull pending bytes into the buffer without extracting a line.
    pub fn fill(&mut self) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            let read = match self.inner.read_available(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.is_idle() => 0,
                Err(err) => return Err(err.into()),
            };
            if read == 0 {
                return Ok(());
            }
            if let Err(err) = self.buf.extend(&chunk[..read]) {
                warn!(link = %self.inner.describe(), error = %err, "discarding unterminated input");
            }
            if read < chunk.len() {
                return Ok(());
            }
        }
    }

    /// Drop buffered and driver-held input.
    pub fn discard(&mut self) -> Result<()> {
        self.buf.clear();
        self.inner.discard_input()?;
        Ok(())
    }

    pub fn buffer(&self) -> &LineBuffer {
        &self.buf
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}
