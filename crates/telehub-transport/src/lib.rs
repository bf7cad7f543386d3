//! Transport handles for telemetry readers.
//!
//! Provides the three physical bindings a reader can own:
//! - Serial ports (radio modules and plain line-oriented serial devices)
//! - TCP socket listeners (one short-lived connection per poll)
//! - I2C buses (addressed register-block reads, Linux only)
//!
//! This is the lowest layer of telehub. Every handle here is opened once at
//! reader construction and fails fast with a [`TransportError`] when the
//! underlying device cannot be used.

pub mod error;
pub mod i2c;
pub mod serial;
pub mod socket;
pub mod traits;

pub use error::{Result, TransportError};
pub use i2c::{bus_path, open_bus, I2C_SUPPORTED};
pub use serial::{available_ports, SerialPortLink, SystemSerialOpener};
pub use socket::SocketListener;
pub use traits::{I2cBus, SerialLink, SerialOpener};
