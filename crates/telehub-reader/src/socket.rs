use std::sync::Arc;

use telehub_frame::{CodecFacts, DecodedFrame, GenericValidator, LineBuffer, RawFrame};
use telehub_transport::socket::DEFAULT_CHUNK_SIZE;
use telehub_transport::SocketListener;
use tracing::{debug, warn};

use crate::error::Result;
use crate::reader::{Reader, ReaderCore};
use crate::settings::{Settings, SettingsMap, SettingsReport};

/// Default listening port.
pub const DEFAULT_PORT: u16 = 50011;

/// Accepts short TCP connections carrying CR-LF terminated frames.
///
/// Each poll takes at most one connection and yields at most one line;
/// further buffered lines come out on later polls.
pub struct SocketReader {
    core: ReaderCore,
    listener: SocketListener,
    buf: LineBuffer,
}

impl SocketReader {
    /// Bind on all interfaces. Fails if the port is unavailable.
    pub fn bind(name: impl Into<String>, port: u16, codec: Arc<dyn CodecFacts>) -> Result<Self> {
        let listener = SocketListener::bind(port)?;
        Ok(Self {
            core: ReaderCore::new(name, codec, Settings::default()),
            listener,
            buf: LineBuffer::new(),
        })
    }

    /// The port actually bound.
    pub fn port(&self) -> u16 {
        self.listener.port()
    }

    fn take_chunk(&mut self) {
        match self.listener.poll_chunk(DEFAULT_CHUNK_SIZE) {
            Ok(Some(chunk)) => {
                if let Err(err) = self.buf.extend(&chunk) {
                    warn!(reader = %self.core.name(), error = %err, "discarding socket input");
                }
            }
            Ok(None) => {}
            Err(err) => {
                warn!(reader = %self.core.name(), error = %err, "socket read failed");
            }
        }
    }
}

/// Split `ts node v1 ..` into a frame carrying its own timestamp.
fn split_timestamp(line: &str) -> Option<RawFrame> {
    let mut tokens = line.split_whitespace();
    let timestamp: f64 = tokens.next()?.parse().ok()?;
    if !timestamp.is_finite() {
        return None;
    }
    Some(RawFrame::at(tokens.collect::<Vec<_>>().join(" "), timestamp))
}

impl Reader for SocketReader {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn poll_raw(&mut self) -> Vec<RawFrame> {
        self.take_chunk();
        let Some(line) = self.buf.next_line() else {
            return Vec::new();
        };

        if !self.core.settings().timestamped {
            return vec![RawFrame::new(line)];
        }
        match split_timestamp(&line) {
            Some(frame) => {
                debug!(reader = %self.core.name(), timestamp = frame.timestamp, "frame carries timestamp");
                vec![frame]
            }
            None => {
                warn!(reader = %self.core.name(), frame = %line, "discarded frame without valid timestamp");
                Vec::new()
            }
        }
    }

    fn decode(&mut self, raw: &RawFrame) -> Option<DecodedFrame> {
        self.core.decode(raw, &GenericValidator)
    }

    fn apply_settings(&mut self, candidate: &SettingsMap) -> SettingsReport {
        let mut report = SettingsReport::default();
        self.core.apply_generic(candidate, &mut report);
        report
    }

    fn settings(&self) -> &Settings {
        self.core.settings()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::net::TcpStream;
    use std::thread;
    use std::time::Duration;

    use telehub_frame::{NodeTable, Value};

    use super::*;

    fn send(port: u16, payload: &[u8]) {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
        stream.write_all(payload).unwrap();
    }

    fn read_until_frame(reader: &mut SocketReader) -> Vec<DecodedFrame> {
        for _ in 0..200 {
            let frames = reader.read();
            if !frames.is_empty() {
                return frames;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("no frame received");
    }

    #[test]
    fn receives_one_line_per_poll() {
        let mut reader = SocketReader::bind("socket", 0, Arc::new(NodeTable::new())).unwrap();
        send(reader.port(), b"5 1 2\r\n6 3 4\r\n");

        let frames = read_until_frame(&mut reader);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].node, 5);

        let frames = reader.read();
        assert_eq!(frames[0].node, 6);
        assert_eq!(frames[0].values, vec![Value::Int(3), Value::Int(4)]);
    }

    #[test]
    fn timestamped_frames_keep_their_time() {
        let mut reader = SocketReader::bind("socket", 0, Arc::new(NodeTable::new())).unwrap();
        let candidate: SettingsMap = serde_json::from_str(r#"{"timestamped": "true"}"#).unwrap();
        reader.apply_settings(&candidate);
        send(reader.port(), b"1700000000.5 7 10 20\r\n");

        let frames = read_until_frame(&mut reader);
        assert_eq!(frames[0].timestamp, 1_700_000_000.5);
        assert_eq!(frames[0].node, 7);
        assert_eq!(frames[0].values, vec![Value::Int(10), Value::Int(20)]);
    }

    #[test]
    fn bad_timestamp_is_dropped() {
        assert!(split_timestamp("later 7 10").is_none());
        assert!(split_timestamp("").is_none());
        let frame = split_timestamp("12.5 7 10").unwrap();
        assert_eq!(frame.line, "7 10");
        assert_eq!(frame.timestamp, Some(12.5));
    }

    #[test]
    fn port_in_use_is_an_init_error() {
        let first = SocketReader::bind("a", 0, Arc::new(NodeTable::new())).unwrap();
        let err = SocketReader::bind("b", first.port(), Arc::new(NodeTable::new()))
            .err()
            .unwrap();
        assert!(err.is_fatal());
    }
}
