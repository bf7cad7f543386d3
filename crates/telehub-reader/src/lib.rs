//! Telemetry readers.
//!
//! A reader owns one transport, turns what arrives on it into
//! [`DecodedFrame`](telehub_frame::DecodedFrame)s and runs in its own polling
//! loop. Four variants share the [`Reader`] contract:
//!
//! - [`SerialReader`]: CR-LF lines from a serial port
//! - [`RadioReader`]: serial radio module with speed autodetect, firmware
//!   query, pushed radio settings and a periodic time broadcast
//! - [`SocketReader`]: CR-LF lines delivered over short TCP connections
//! - [`BusReader`]: I2C devices triggered and polled on an interval
//!
//! Loops are started with [`spawn_reader`]; all of them feed one shared queue.

pub mod bus;
pub mod error;
pub mod factory;
pub mod handshake;
pub mod radio;
pub mod reader;
pub mod runner;
pub mod serial;
pub mod settings;
pub mod socket;

#[cfg(test)]
mod mock;

pub use bus::{BusReader, BusSettings};
pub use error::{ReaderError, Result};
pub use factory::{BusInit, RadioInit, ReaderInit, ReaderKind, SerialInit, SocketInit};
pub use handshake::{BusTiming, FirmwareInfo, RadioTiming};
pub use radio::{Band, RadioReader, RadioSettings, RadioValidator};
pub use reader::{Reader, ReaderCore};
pub use runner::{frame_queue, spawn_reader, FrameReceiver, FrameSender, LoopConfig, ReaderHandle};
pub use serial::SerialReader;
pub use settings::{Settings, SettingsMap, SettingsReport};
pub use socket::SocketReader;
