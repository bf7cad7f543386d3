//! Construction of readers from configuration.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use telehub_frame::CodecFacts;
use telehub_transport::SystemSerialOpener;

use crate::bus::BusReader;
use crate::error::{ReaderError, Result};
use crate::handshake::{BusTiming, RadioTiming};
use crate::radio::RadioReader;
use crate::reader::Reader;
use crate::serial::{SerialReader, DEFAULT_BAUD};
use crate::socket::{SocketReader, DEFAULT_PORT};

/// Reader variant named by the `type` key of a reader section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReaderKind {
    Serial,
    Radio,
    Socket,
    Bus,
}

impl fmt::Display for ReaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReaderKind::Serial => "serial",
            ReaderKind::Radio => "radio",
            ReaderKind::Socket => "socket",
            ReaderKind::Bus => "bus",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SerialInit {
    pub port: PathBuf,
    #[serde(default = "default_serial_baud")]
    pub baud: u32,
}

/// `baud` 0 means probe the line speed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RadioInit {
    #[serde(default = "default_radio_port")]
    pub port: PathBuf,
    #[serde(default)]
    pub baud: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SocketInit {
    #[serde(default = "default_socket_port")]
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BusInit {
    #[serde(default = "default_bus")]
    pub bus: u8,
}

fn default_serial_baud() -> u32 {
    DEFAULT_BAUD
}

fn default_radio_port() -> PathBuf {
    PathBuf::from("/dev/ttyAMA0")
}

fn default_socket_port() -> u16 {
    DEFAULT_PORT
}

fn default_bus() -> u8 {
    1
}

/// Typed init settings for one reader. A change to these recreates the reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReaderInit {
    Serial(SerialInit),
    Radio(RadioInit),
    Socket(SocketInit),
    Bus(BusInit),
}

impl ReaderInit {
    /// Interpret an untyped `init` section for `kind`. `null` means all defaults.
    pub fn from_parts(kind: ReaderKind, init: &serde_json::Value) -> Result<Self> {
        Ok(match kind {
            ReaderKind::Serial => ReaderInit::Serial(parse_init(kind, init)?),
            ReaderKind::Radio => ReaderInit::Radio(parse_init(kind, init)?),
            ReaderKind::Socket => ReaderInit::Socket(parse_init(kind, init)?),
            ReaderKind::Bus => ReaderInit::Bus(parse_init(kind, init)?),
        })
    }

    pub fn kind(&self) -> ReaderKind {
        match self {
            ReaderInit::Serial(_) => ReaderKind::Serial,
            ReaderInit::Radio(_) => ReaderKind::Radio,
            ReaderInit::Socket(_) => ReaderKind::Socket,
            ReaderInit::Bus(_) => ReaderKind::Bus,
        }
    }

    /// Open the transport and build the reader.
    pub fn open(&self, name: &str, codec: Arc<dyn CodecFacts>) -> Result<Box<dyn Reader>> {
        let reader: Box<dyn Reader> = match self {
            ReaderInit::Serial(init) => {
                Box::new(SerialReader::open(name, &init.port, init.baud, codec)?)
            }
            ReaderInit::Radio(init) => Box::new(RadioReader::open(
                name,
                &SystemSerialOpener,
                &init.port,
                init.baud,
                codec,
                RadioTiming::default(),
            )?),
            ReaderInit::Socket(init) => Box::new(SocketReader::bind(name, init.port, codec)?),
            ReaderInit::Bus(init) => {
                Box::new(BusReader::open(name, init.bus, codec, BusTiming::default())?)
            }
        };
        Ok(reader)
    }
}

fn parse_init<T: DeserializeOwned>(kind: ReaderKind, init: &serde_json::Value) -> Result<T> {
    let value = match init {
        serde_json::Value::Null => serde_json::Value::Object(Default::default()),
        other => other.clone(),
    };
    serde_json::from_value(value)
        .map_err(|err| ReaderError::Config(format!("{kind} init: {err}")))
}
