use std::path::Path;
use std::sync::Arc;

use telehub_frame::{CodecFacts, DecodedFrame, GenericValidator, LineReader, RawFrame};
use telehub_transport::{SerialLink, SerialPortLink};
use tracing::{info, warn};

use crate::error::Result;
use crate::reader::{Reader, ReaderCore};
use crate::settings::{Settings, SettingsMap, SettingsReport};

/// Default line speed for plain serial readers.
pub const DEFAULT_BAUD: u32 = 9600;

/// Reads CR-LF terminated `node v1 v2 ...` lines from a serial port.
pub struct SerialReader {
    core: ReaderCore,
    lines: LineReader<Box<dyn SerialLink>>,
    faulted: bool,
}

impl SerialReader {
    /// Open `path` at `baud`. Fails if the port cannot be opened.
    pub fn open(
        name: impl Into<String>,
        path: impl AsRef<Path>,
        baud: u32,
        codec: Arc<dyn CodecFacts>,
    ) -> Result<Self> {
        let name = name.into();
        let link = SerialPortLink::open(path.as_ref(), baud)?;
        info!(reader = %name, port = %path.as_ref().display(), baud, "opened serial port");
        Ok(Self::from_link(name, Box::new(link), codec))
    }

    pub fn from_link(
        name: impl Into<String>,
        link: Box<dyn SerialLink>,
        codec: Arc<dyn CodecFacts>,
    ) -> Self {
        Self {
            core: ReaderCore::new(name, codec, Settings::default()),
            lines: LineReader::new(link),
            faulted: false,
        }
    }
}

impl Reader for SerialReader {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn poll_raw(&mut self) -> Vec<RawFrame> {
        poll_line(&mut self.lines, self.core.name(), &mut self.faulted)
            .map(RawFrame::new)
            .into_iter()
            .collect()
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

/// Take the next complete line from a serial link, if one has arrived.
///
/// A link error is logged once per fault and yields nothing; polling
/// continues on the next iteration.
pub(crate) fn poll_line(
    lines: &mut LineReader<Box<dyn SerialLink>>,
    reader: &str,
    faulted: &mut bool,
) -> Option<String> {
    match lines.poll_line() {
        Ok(line) => {
            *faulted = false;
            line
        }
        Err(err) => {
            if !*faulted {
                warn!(reader, link = %lines.get_ref().describe(), error = %err, "serial read failed");
                *faulted = true;
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use telehub_frame::{NodeTable, PauseMode, Value};

    use super::*;
    use crate::mock::ScriptedLink;

    fn reader(link: &ScriptedLink) -> SerialReader {
        SerialReader::from_link("serial", link.boxed(), Arc::new(NodeTable::new()))
    }

    #[test]
    fn one_line_per_poll_with_remainder_kept() {
        let link = ScriptedLink::new();
        link.push(b"10 1 2\r\n11 3");
        let mut reader = reader(&link);

        let frames = reader.read();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].node, 10);
        assert_eq!(frames[0].values, vec![Value::Int(1), Value::Int(2)]);

        assert!(reader.read().is_empty());

        link.push(b" 4\r\n12 5\r\n");
        let frames = reader.read();
        assert_eq!(frames[0].node, 11);
        assert_eq!(frames[0].reference, 2);
        let frames = reader.read();
        assert_eq!(frames[0].node, 12);
        assert_eq!(frames[0].values, vec![Value::Int(5)]);
    }

    #[test]
    fn invalid_lines_consume_a_reference() {
        let link = ScriptedLink::new();
        link.push(b"10 x\r\n10 7\r\n");
        let mut reader = reader(&link);
        assert!(reader.read().is_empty());
        let frames = reader.read();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].reference, 2);
    }

    #[test]
    fn pause_in_stops_decoding() {
        let link = ScriptedLink::new();
        let mut reader = reader(&link);
        let candidate: SettingsMap = serde_json::from_str(r#"{"pause": "in"}"#).unwrap();
        let report = reader.apply_settings(&candidate);
        assert_eq!(report.changed, vec!["pause"]);
        assert_eq!(reader.settings().pause, PauseMode::In);

        link.push(b"10 1\r\n");
        assert!(reader.read().is_empty());
        assert_eq!(reader.core.frames_seen(), 0);
    }
}
