//! Serial radio modules (RFM12/RFM69 style firmware).
//!
//! The module prefixes frames with `OK`, appends the received signal
//! strength in parentheses and echoes a status query as `? .. (x)`. It also
//! prints acknowledgements (`>`, ` ->`) and, after a settings change, its
//! full settings string; none of those are frames.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::Timelike;
use serde::Serialize;
use serde_json::Value;
use telehub_frame::{
    validate_generic, CodecFacts, Datacode, DecodedFrame, FrameError, FrameValidator, RawFrame,
    Validated,
};
use telehub_transport::SerialOpener;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::handshake::{
    has_device_markers, open_radio, push_command, query_firmware, time_broadcast_packet,
    FirmwareInfo, RadioLink, RadioTiming,
};
use crate::reader::{Reader, ReaderCore};
use crate::serial::poll_line;
use crate::settings::{parse_bool, parse_uint, Settings, SettingsMap, SettingsReport};

/// Radio carrier frequency band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Band {
    #[serde(rename = "433")]
    Mhz433,
    #[serde(rename = "868")]
    Mhz868,
    #[serde(rename = "915")]
    Mhz915,
}

impl Band {
    pub fn mhz(self) -> u32 {
        match self {
            Band::Mhz433 => 433,
            Band::Mhz868 => 868,
            Band::Mhz915 => 915,
        }
    }

    pub fn from_mhz(mhz: u64) -> Option<Band> {
        match mhz {
            433 => Some(Band::Mhz433),
            868 => Some(Band::Mhz868),
            915 => Some(Band::Mhz915),
            _ => None,
        }
    }

    /// Digit the firmware expects in a `b` command.
    fn command_digit(self) -> char {
        match self {
            Band::Mhz433 => '4',
            Band::Mhz868 => '8',
            Band::Mhz915 => '9',
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mhz())
    }
}

/// Settings pushed to the radio module.
///
/// `None` until the first push succeeds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RadioSettings {
    pub baseid: Option<u8>,
    pub frequency: Option<Band>,
    pub group: Option<u8>,
    pub quiet: Option<bool>,
}

impl RadioSettings {
    /// Factory values of the radio firmware.
    pub fn defaults() -> Self {
        Self {
            baseid: Some(DEFAULT_BASEID),
            frequency: Some(DEFAULT_BAND),
            group: Some(DEFAULT_GROUP),
            quiet: Some(DEFAULT_QUIET),
        }
    }

    /// The defaults the firmware settings string shows as already in force.
    ///
    /// Values the device does not show stay `None` and are pushed by the
    /// first application.
    pub fn confirmed_by(firmware: &FirmwareInfo) -> Self {
        fn seed<T: Copy>(firmware: &FirmwareInfo, value: T, command: RadioCommand) -> Option<T> {
            firmware.confirms(&command.confirmation()).then_some(value)
        }
        Self {
            baseid: seed(firmware, DEFAULT_BASEID, RadioCommand::BaseId(DEFAULT_BASEID)),
            frequency: seed(firmware, DEFAULT_BAND, RadioCommand::Frequency(DEFAULT_BAND)),
            group: seed(firmware, DEFAULT_GROUP, RadioCommand::Group(DEFAULT_GROUP)),
            quiet: seed(firmware, DEFAULT_QUIET, RadioCommand::Quiet(DEFAULT_QUIET)),
        }
    }
}

/// Values applied when a key is missing from the candidate map.
const DEFAULT_BASEID: u8 = 15;
const DEFAULT_BAND: Band = Band::Mhz433;
const DEFAULT_GROUP: u8 = 210;
const DEFAULT_QUIET: bool = true;

/// Radio defaults differ from the generic ones in datacode.
fn radio_defaults() -> Settings {
    Settings {
        datacode: Datacode::I16,
        ..Settings::default()
    }
}

/// A radio setting ready to be pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RadioCommand {
    BaseId(u8),
    Frequency(Band),
    Group(u8),
    Quiet(bool),
}

impl RadioCommand {
    fn key(self) -> &'static str {
        match self {
            RadioCommand::BaseId(_) => "baseid",
            RadioCommand::Frequency(_) => "frequency",
            RadioCommand::Group(_) => "group",
            RadioCommand::Quiet(_) => "quiet",
        }
    }

    /// Command text sent to the firmware.
    fn command(self) -> String {
        match self {
            RadioCommand::BaseId(id) => format!("{id}i"),
            RadioCommand::Frequency(band) => format!("{}b", band.command_digit()),
            RadioCommand::Group(group) => format!("{group}g"),
            RadioCommand::Quiet(quiet) => format!("{}q", u8::from(quiet)),
        }
    }

    /// Fragment of the firmware settings string that shows this value.
    fn confirmation(self) -> String {
        match self {
            RadioCommand::BaseId(id) => format!("i{id}"),
            RadioCommand::Frequency(band) => format!("@ {band}"),
            RadioCommand::Group(group) => format!("g{group}"),
            RadioCommand::Quiet(quiet) => format!("q{}", u8::from(quiet)),
        }
    }
}

fn parse_baseid(value: &Value) -> Option<u8> {
    parse_uint(value)
        .filter(|id| (1..=26).contains(id))
        .map(|id| id as u8)
}

fn parse_band(value: &Value) -> Option<Band> {
    parse_uint(value).and_then(Band::from_mhz)
}

fn parse_group(value: &Value) -> Option<u8> {
    parse_uint(value).filter(|g| *g <= 212).map(|g| g as u8)
}

/// Strips the radio's protocol tokens before generic validation.
#[derive(Debug, Clone, Copy, Default)]
pub struct RadioValidator;

impl FrameValidator for RadioValidator {
    fn validate(&self, _reference: u64, mut tokens: Vec<String>) -> telehub_frame::Result<Validated> {
        let trailing = tokens.last().and_then(|t| parenthesized(t));
        if tokens.first().map(String::as_str) == Some("?") {
            if let Some(signal) = trailing {
                return Err(FrameError::UnreliableContent {
                    signal: signal.to_string(),
                });
            }
        }

        if tokens.first().map(String::as_str) == Some("OK") {
            tokens.remove(0);
        }

        let mut signal_quality = None;
        if let Some(inner) = tokens.last().and_then(|t| parenthesized(t)) {
            let signal = inner.parse::<i32>().map_err(|_| FrameError::NonNumeric {
                token: inner.to_string(),
            })?;
            signal_quality = Some(signal);
            tokens.pop();
        }

        Ok(Validated {
            tokens: validate_generic(tokens)?,
            signal_quality,
        })
    }
}

fn parenthesized(token: &str) -> Option<&str> {
    token.strip_prefix('(')?.strip_suffix(')')
}

/// What a radio line turned out to be.
#[derive(Debug, PartialEq, Eq)]
enum RadioLine {
    Frame(String),
    Acknowledgement,
    Control,
    SettingsEcho(String),
}

fn classify(line: String) -> RadioLine {
    if line.starts_with('>') || line.starts_with(" ->") {
        RadioLine::Acknowledgement
    } else if line.starts_with('\u{1}') {
        RadioLine::Control
    } else if has_device_markers(&line) {
        RadioLine::SettingsEcho(line)
    } else {
        RadioLine::Frame(line)
    }
}

/// Serial radio reader with settings push and time broadcast.
pub struct RadioReader {
    core: ReaderCore,
    lines: RadioLink,
    radio: RadioSettings,
    firmware: FirmwareInfo,
    timing: RadioTiming,
    last_broadcast: Option<Instant>,
    faulted: bool,
}

impl RadioReader {
    /// Open the radio, probing line speeds when `baud` is 0, and query its
    /// firmware.
    ///
    /// Open failures and a failed speed probe are errors. A missing version
    /// reply only disables settings confirmation.
    pub fn open(
        name: impl Into<String>,
        opener: &dyn SerialOpener,
        path: impl AsRef<Path>,
        baud: u32,
        codec: Arc<dyn CodecFacts>,
        timing: RadioTiming,
    ) -> Result<Self> {
        let name = name.into();
        let mut lines = open_radio(opener, path.as_ref(), baud, &timing)?;
        let firmware = match query_firmware(&mut lines, &timing) {
            Ok(firmware) => firmware,
            Err(err) => {
                warn!(reader = %name, error = %err, "radio firmware unknown");
                FirmwareInfo::default()
            }
        };
        Ok(Self::from_link(name, lines, firmware, codec, timing))
    }

    pub fn from_link(
        name: impl Into<String>,
        lines: RadioLink,
        firmware: FirmwareInfo,
        codec: Arc<dyn CodecFacts>,
        timing: RadioTiming,
    ) -> Self {
        let radio = RadioSettings::confirmed_by(&firmware);
        Self {
            core: ReaderCore::new(name, codec, radio_defaults()),
            lines,
            radio,
            firmware,
            timing,
            last_broadcast: None,
            faulted: false,
        }
    }

    pub fn radio_settings(&self) -> &RadioSettings {
        &self.radio
    }

    pub fn firmware(&self) -> &FirmwareInfo {
        &self.firmware
    }

    /// Push one command unless its value is already committed.
    ///
    /// Returns `true` when the value was pushed and committed.
    fn push(&mut self, command: RadioCommand, committed: bool) -> bool {
        if committed {
            return false;
        }

        let text = command.command();
        match push_command(&mut self.lines, &text, &self.timing) {
            Ok(()) => {
                info!(reader = %self.core.name(), key = command.key(), command = %text, "radio setting pushed");
                true
            }
            Err(err) => {
                warn!(reader = %self.core.name(), key = command.key(), error = %err, "radio setting not applied");
                false
            }
        }
    }

    fn apply_radio(&mut self, candidate: &SettingsMap, report: &mut SettingsReport) {
        let name = self.core.name().to_string();

        if let Some(id) = resolve(&name, "baseid", candidate, DEFAULT_BASEID, parse_baseid, report) {
            let committed = self.radio.baseid == Some(id);
            if self.push(RadioCommand::BaseId(id), committed) {
                self.radio.baseid = Some(id);
                report.accept("baseid");
            }
        }
        if let Some(band) = resolve(&name, "frequency", candidate, DEFAULT_BAND, parse_band, report) {
            let committed = self.radio.frequency == Some(band);
            if self.push(RadioCommand::Frequency(band), committed) {
                self.radio.frequency = Some(band);
                report.accept("frequency");
            }
        }
        if let Some(group) = resolve(&name, "group", candidate, DEFAULT_GROUP, parse_group, report) {
            let committed = self.radio.group == Some(group);
            if self.push(RadioCommand::Group(group), committed) {
                self.radio.group = Some(group);
                report.accept("group");
            }
        }
        if let Some(quiet) = resolve(&name, "quiet", candidate, DEFAULT_QUIET, parse_bool, report) {
            let committed = self.radio.quiet == Some(quiet);
            if self.push(RadioCommand::Quiet(quiet), committed) {
                self.radio.quiet = Some(quiet);
                report.accept("quiet");
            }
        }
    }

    fn broadcast_due(&self, now: Instant) -> bool {
        let interval = self.core.settings().interval;
        if interval == 0 {
            return false;
        }
        match self.last_broadcast {
            None => true,
            Some(last) => now.duration_since(last).as_secs() >= interval,
        }
    }
}

/// Candidate value for a radio key, or `None` if it was rejected.
fn resolve<T: PartialEq + fmt::Debug>(
    reader: &str,
    key: &'static str,
    candidate: &SettingsMap,
    default: T,
    parse: impl Fn(&Value) -> Option<T>,
    report: &mut SettingsReport,
) -> Option<T> {
    match candidate.get(key) {
        None => Some(default),
        Some(raw) => {
            let value = parse(raw);
            if value.is_none() {
                report.reject(reader, key, raw);
            }
            value
        }
    }
}

impl Reader for RadioReader {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn poll_raw(&mut self) -> Vec<RawFrame> {
        let Some(line) = poll_line(&mut self.lines, self.core.name(), &mut self.faulted) else {
            return Vec::new();
        };
        match classify(line) {
            RadioLine::Frame(line) => return vec![RawFrame::new(line)],
            RadioLine::Acknowledgement => {
                debug!(reader = %self.core.name(), "radio acknowledged command");
            }
            RadioLine::Control => {}
            RadioLine::SettingsEcho(line) => {
                debug!(reader = %self.core.name(), settings = %line.trim(), "radio settings");
                self.firmware.settings = line;
            }
        }
        Vec::new()
    }

    fn decode(&mut self, raw: &RawFrame) -> Option<DecodedFrame> {
        self.core.decode(raw, &RadioValidator)
    }

    fn apply_settings(&mut self, candidate: &SettingsMap) -> SettingsReport {
        let mut report = SettingsReport::default();
        self.apply_radio(candidate, &mut report);
        self.core.apply_generic(candidate, &mut report);
        report
    }

    fn settings(&self) -> &Settings {
        self.core.settings()
    }

    /// Broadcast the local time every `interval` seconds.
    fn periodic_action(&mut self) {
        let now = Instant::now();
        if !self.broadcast_due(now) {
            return;
        }
        self.last_broadcast = Some(now);

        let local = chrono::Local::now();
        let packet = time_broadcast_packet(local.hour(), local.minute());
        debug!(
            reader = %self.core.name(),
            time = %format!("{:02}:{:02}", local.hour(), local.minute()),
            "broadcasting time"
        );
        if let Err(err) = self.lines.get_mut().write_all(packet.as_bytes()) {
            warn!(reader = %self.core.name(), error = %err, "time broadcast failed");
        }
    }
}
