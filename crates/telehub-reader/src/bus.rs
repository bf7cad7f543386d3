//! Polled I2C sensor boards.
//!
//! Every `interval` seconds each configured device is sent a trigger byte,
//! given a moment to settle, then read for a fixed-length block. A block
//! becomes the frame `addr b1 b2 ..`, decoded like any other line.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use telehub_frame::{now_timestamp, CodecFacts, Datacode, DecodedFrame, GenericValidator, RawFrame};
use telehub_transport::I2cBus;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::handshake::{read_device, trigger_devices, BusTiming, MAX_READ_ATTEMPTS};
use crate::reader::{Reader, ReaderCore};
use crate::settings::{apply_key, parse_uint, parse_uint_list, Settings, SettingsMap, SettingsReport};

/// Valid 7-bit device addresses.
const ADDRESS_RANGE: std::ops::RangeInclusive<u64> = 3..=119;

/// Largest block a device may be asked for.
const MAX_BLOCK_LEN: u64 = 32;

/// Bus readers poll every five seconds unless configured otherwise.
fn bus_defaults() -> Settings {
    Settings {
        interval: 5,
        datacode: Datacode::I16,
        ..Settings::default()
    }
}

/// Devices to poll and how much to read from each.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BusSettings {
    pub device_ids: Vec<u16>,
    /// Bytes read per device and cycle.
    pub length: u8,
}

fn parse_device_ids(value: &Value) -> Option<Vec<u16>> {
    parse_uint_list(value)?
        .into_iter()
        .map(|id| ADDRESS_RANGE.contains(&id).then_some(id as u16))
        .collect()
}

fn parse_length(value: &Value) -> Option<u8> {
    parse_uint(value)
        .filter(|len| *len <= MAX_BLOCK_LEN)
        .map(|len| len as u8)
}

/// Reads measurement blocks from I2C devices on one bus.
pub struct BusReader<B = Box<dyn I2cBus>> {
    core: ReaderCore,
    bus: B,
    devices: BusSettings,
    timing: BusTiming,
    last_cycle: Option<Instant>,
}

impl<B: I2cBus> BusReader<B> {
    pub fn new(name: impl Into<String>, bus: B, codec: Arc<dyn CodecFacts>, timing: BusTiming) -> Self {
        Self {
            core: ReaderCore::new(name, codec, bus_defaults()),
            bus,
            devices: BusSettings::default(),
            timing,
            last_cycle: None,
        }
    }

    pub fn bus_settings(&self) -> &BusSettings {
        &self.devices
    }

    pub fn get_ref(&self) -> &B {
        &self.bus
    }

    fn cycle_due(&self, now: Instant) -> bool {
        match self.last_cycle {
            None => true,
            Some(last) => now.duration_since(last) >= Duration::from_secs(self.core.settings().interval),
        }
    }

    /// Trigger, settle and read every device once.
    fn poll_devices(&mut self) -> Vec<RawFrame> {
        let name = self.core.name().to_string();
        let timestamp = now_timestamp();

        trigger_devices(&mut self.bus, &name, &self.devices.device_ids);
        thread::sleep(self.timing.settle);

        let mut frames = Vec::new();
        for &address in &self.devices.device_ids {
            match read_device(&mut self.bus, address, self.devices.length) {
                Ok((block, retries)) => {
                    if retries > 0 {
                        debug!(reader = %name, address, retries, "device read needed retries");
                    }
                    if block.is_empty() {
                        continue;
                    }
                    frames.push(RawFrame::at(block_frame(address, &block), timestamp));
                }
                Err(err) => {
                    warn!(
                        reader = %name,
                        address,
                        attempts = MAX_READ_ATTEMPTS,
                        error = %err,
                        "giving up on device this cycle"
                    );
                }
            }
        }
        frames
    }
}

/// `addr b1 b2 ..` with bytes in decimal.
fn block_frame(address: u16, block: &[u8]) -> String {
    let mut line = address.to_string();
    for byte in block {
        line.push(' ');
        line.push_str(&byte.to_string());
    }
    line
}

impl BusReader<Box<dyn I2cBus>> {
    /// Open I2C bus `bus_id`. Fails when the bus or driver is unavailable.
    pub fn open(
        name: impl Into<String>,
        bus_id: u8,
        codec: Arc<dyn CodecFacts>,
        timing: BusTiming,
    ) -> Result<Self> {
        let name = name.into();
        let bus = telehub_transport::open_bus(bus_id)?;
        info!(reader = %name, bus = bus_id, "opened i2c bus");
        Ok(Self::new(name, bus, codec, timing))
    }
}

impl<B: I2cBus> Reader for BusReader<B> {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn poll_raw(&mut self) -> Vec<RawFrame> {
        let now = Instant::now();
        if !self.cycle_due(now) {
            return Vec::new();
        }
        self.last_cycle = Some(now);
        self.poll_devices()
    }

    fn decode(&mut self, raw: &RawFrame) -> Option<DecodedFrame> {
        self.core.decode(raw, &GenericValidator)
    }

    fn apply_settings(&mut self, candidate: &SettingsMap) -> SettingsReport {
        let mut report = SettingsReport::default();
        let name = self.core.name().to_string();
        apply_key(
            &name,
            "deviceids",
            candidate,
            Vec::new(),
            parse_device_ids,
            &mut self.devices.device_ids,
            &mut report,
        );
        apply_key(
            &name,
            "length",
            candidate,
            0,
            parse_length,
            &mut self.devices.length,
            &mut report,
        );
        self.core.apply_generic(candidate, &mut report);
        report
    }

    fn settings(&self) -> &Settings {
        self.core.settings()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use telehub_frame::{NodeTable, Value};

    use super::*;
    use crate::mock::MockBus;

    fn reader(bus: MockBus, settings: serde_json::Value) -> BusReader<MockBus> {
        let mut reader = BusReader::new(
            "bus",
            bus,
            Arc::new(NodeTable::new()),
            BusTiming {
                settle: Duration::ZERO,
            },
        );
        let report = reader.apply_settings(&serde_json::from_value(settings).unwrap());
        assert!(report.is_clean());
        reader
    }

    #[test]
    fn polls_each_device_once_per_cycle() {
        let bus = MockBus::default()
            .with_block(8, &[1, 0, 2, 0])
            .with_block(9, &[255, 255, 0, 1]);
        let mut reader = reader(bus.clone(), json!({"deviceids": "8,9", "length": 4}));

        let frames = reader.read();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].node, 8);
        assert_eq!(frames[0].values, vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(frames[1].values, vec![Value::Int(-1), Value::Int(256)]);
        assert_eq!(frames[0].timestamp, frames[1].timestamp);
        assert_eq!(bus.state.lock().unwrap().triggers, vec![(8, 4), (9, 4)]);

        // Interval not elapsed yet.
        assert!(reader.read().is_empty());
    }

    #[test]
    fn retried_read_yields_one_frame() {
        let bus = MockBus::default().with_block(8, &[7, 0]).failing(8, 4);
        let mut reader = reader(bus.clone(), json!({"deviceids": [8], "length": 2}));
        let frames = reader.read();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].values, vec![Value::Int(7)]);
        assert_eq!(bus.state.lock().unwrap().reads.len(), 5);
    }

    #[test]
    fn exhausted_device_is_skipped() {
        let bus = MockBus::default()
            .with_block(8, &[7, 0])
            .failing(8, 5)
            .with_block(9, &[1, 0]);
        let mut reader = reader(bus.clone(), json!({"deviceids": [8, 9], "length": 2}));
        let frames = reader.read();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].node, 9);
        let reads = bus.state.lock().unwrap().reads.clone();
        assert_eq!(reads.iter().filter(|a| **a == 8).count(), 5);
    }

    #[test]
    fn zero_length_produces_no_frames() {
        let bus = MockBus::default().with_block(8, &[7, 0]);
        let mut reader = reader(bus, json!({"deviceids": [8], "length": 0}));
        assert!(reader.read().is_empty());
    }

    #[test]
    fn invalid_device_settings_are_rejected() {
        let mut reader = reader(MockBus::default(), json!({"deviceids": [8], "length": 2}));
        let report = reader.apply_settings(
            &serde_json::from_value(json!({"deviceids": [2, 8], "length": 33})).unwrap(),
        );
        assert_eq!(report.rejected.len(), 2);
        assert_eq!(reader.bus_settings().device_ids, vec![8]);
        assert_eq!(reader.bus_settings().length, 2);
        assert_eq!(reader.settings().interval, 5);
    }

    #[test]
    fn frame_text_lists_bytes() {
        assert_eq!(block_frame(12, &[0, 255, 3]), "12 0 255 3");
    }
}
