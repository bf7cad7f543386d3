//! Device bring-up and exchange protocols.
//!
//! Radio: probe line speeds with a status query, ask for the firmware
//! identity, push settings as short ASCII commands. I2C: trigger every
//! device, let them settle, then read a fixed-length block from each with
//! bounded retries.

use std::path::Path;
use std::thread;
use std::time::Duration;

use telehub_frame::LineReader;
use telehub_transport::{I2cBus, SerialLink, SerialOpener};
use tracing::{debug, info};

use crate::error::{ReaderError, Result};

/// Line speeds probed, in order, when no speed is configured.
pub const AUTODETECT_BAUDS: [u32; 2] = [57600, 9600];

/// Fragments a firmware settings string must all contain to be recognised.
pub const DEVICE_MARKERS: [&str; 4] = [" i", " g", " @ ", " MHz"];

/// Status query sent while probing line speeds.
const STATUS_QUERY: &[u8] = b"?";

/// Firmware version query.
const VERSION_QUERY: &[u8] = b"v";

/// A radio serial link with its line buffer.
pub type RadioLink = LineReader<Box<dyn SerialLink>>;

/// Delays used by the radio handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioTiming {
    /// Wait after a query before reading the reply.
    pub settle: Duration,
    /// Pause after each pushed command.
    pub command_gap: Duration,
}

impl Default for RadioTiming {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(2),
            command_gap: Duration::from_secs(1),
        }
    }
}

impl RadioTiming {
    /// No delays; for scripted links.
    pub const fn immediate() -> Self {
        Self {
            settle: Duration::ZERO,
            command_gap: Duration::ZERO,
        }
    }
}

/// Identity reported by the radio firmware in reply to `v`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirmwareInfo {
    pub version: String,
    /// Settings string, e.g. ` i15 g210 @ 433 MHz`. Leading space kept.
    pub settings: String,
}

impl FirmwareInfo {
    /// Split a version reply into its first token and the rest.
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end();
        let body = line.trim_start();
        let version = body.split_whitespace().next().unwrap_or_default();
        Self {
            version: version.to_string(),
            settings: body[version.len()..].to_string(),
        }
    }

    /// Whether the settings string can be used to confirm pushed values.
    pub fn supports_confirmation(&self) -> bool {
        has_device_markers(&self.settings)
    }

    /// Whether the settings string already shows `fragment` (e.g. `g210` or
    /// `@ 433`) as whole whitespace-separated tokens.
    pub fn confirms(&self, fragment: &str) -> bool {
        if !self.supports_confirmation() {
            return false;
        }
        let wanted: Vec<&str> = fragment.split_whitespace().collect();
        if wanted.is_empty() {
            return false;
        }
        let shown: Vec<&str> = self.settings.split_whitespace().collect();
        shown.windows(wanted.len()).any(|window| window == wanted.as_slice())
    }
}

pub fn has_device_markers(line: &str) -> bool {
    DEVICE_MARKERS.iter().all(|marker| line.contains(marker))
}

/// Open the radio at `baud`, or probe [`AUTODETECT_BAUDS`] when `baud` is 0.
pub fn open_radio(
    opener: &dyn SerialOpener,
    path: &Path,
    baud: u32,
    timing: &RadioTiming,
) -> Result<RadioLink> {
    if baud != 0 {
        let link = opener.open(path, baud)?;
        info!(port = %path.display(), baud, "opened radio");
        return Ok(LineReader::new(link));
    }
    autodetect(opener, path, timing)
}

/// Probe each candidate speed with a status query.
///
/// A speed is accepted when the reply holds a CR-LF or a NUL byte; links at
/// other speeds are closed. Input received during the probe is discarded.
pub fn autodetect(opener: &dyn SerialOpener, path: &Path, timing: &RadioTiming) -> Result<RadioLink> {
    for baud in AUTODETECT_BAUDS {
        let mut link = opener.open(path, baud)?;
        debug!(port = %path.display(), baud, "probing radio");

        if let Err(err) = link.write_all(STATUS_QUERY) {
            debug!(port = %path.display(), baud, error = %err, "status query failed");
            continue;
        }
        thread::sleep(timing.settle);

        let mut lines = LineReader::new(link);
        if let Err(err) = lines.fill() {
            debug!(port = %path.display(), baud, error = %err, "no reply");
            continue;
        }
        let buf = lines.buffer();
        if buf.has_line() || buf.contains(|b| b == 0) {
            lines.discard().map_err(ReaderError::device)?;
            info!(port = %path.display(), baud, "detected radio");
            return Ok(lines);
        }
        debug!(port = %path.display(), baud, "no reply");
    }

    Err(ReaderError::DeviceCommunication(format!(
        "no reply from {} at any of {AUTODETECT_BAUDS:?} bit/s",
        path.display()
    )))
}

/// Send the version query and parse the first non-empty reply line.
pub fn query_firmware(link: &mut RadioLink, timing: &RadioTiming) -> Result<FirmwareInfo> {
    link.get_mut()
        .write_all(VERSION_QUERY)
        .map_err(ReaderError::device)?;
    thread::sleep(timing.settle);

    let mut reply = None;
    while let Some(line) = link.poll_line().map_err(ReaderError::device)? {
        if !line.trim().is_empty() {
            reply = Some(line);
            break;
        }
    }
    link.discard().map_err(ReaderError::device)?;

    let line = reply.ok_or_else(|| {
        ReaderError::DeviceCommunication("no reply to version query".to_string())
    })?;
    let firmware = FirmwareInfo::parse(&line);
    info!(
        link = %link.get_ref().describe(),
        version = %firmware.version,
        settings = %firmware.settings.trim(),
        "radio firmware"
    );
    Ok(firmware)
}

/// Write one settings command and wait out the command gap.
pub fn push_command(link: &mut RadioLink, command: &str, timing: &RadioTiming) -> Result<()> {
    link.get_mut()
        .write_all(command.as_bytes())
        .map_err(|err| ReaderError::DeviceCommunication(format!("command {command:?}: {err}")))?;
    thread::sleep(timing.command_gap);
    Ok(())
}

/// Radio packet carrying the local time to node 0.
pub fn time_broadcast_packet(hour: u32, minute: u32) -> String {
    format!("0,{hour},{minute},0,0s")
}

/// Byte written to every I2C device to start a measurement.
pub const TRIGGER_COMMAND: u8 = 4;

/// Register the measurement block is read from.
pub const BLOCK_REGISTER: u8 = 0;

/// Block reads attempted per device and cycle.
pub const MAX_READ_ATTEMPTS: u32 = 5;

/// Delays used by the I2C polling cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusTiming {
    /// Wait between triggering and reading.
    pub settle: Duration,
}

impl Default for BusTiming {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(10),
        }
    }
}

/// Send [`TRIGGER_COMMAND`] to every device. Failures are logged only.
pub fn trigger_devices<B: I2cBus + ?Sized>(bus: &mut B, reader: &str, devices: &[u16]) {
    for &address in devices {
        if let Err(err) = bus.write_byte(address, TRIGGER_COMMAND) {
            debug!(reader, address, error = %err, "trigger failed");
        }
    }
}

/// Read one device's block, retrying up to [`MAX_READ_ATTEMPTS`] times.
///
/// Returns the block and the number of failed attempts before it arrived.
pub fn read_device<B: I2cBus + ?Sized>(bus: &mut B, address: u16, len: u8) -> Result<(Vec<u8>, u32)> {
    let mut last = None;
    for attempt in 0..MAX_READ_ATTEMPTS {
        match bus.read_block(address, BLOCK_REGISTER, len) {
            Ok(block) => return Ok((block, attempt)),
            Err(err) => last = Some(err),
        }
    }
    let reason = last.map(|e| e.to_string()).unwrap_or_default();
    Err(ReaderError::DeviceCommunication(format!(
        "device {address}: {MAX_READ_ATTEMPTS} reads failed: {reason}"
    )))
}
