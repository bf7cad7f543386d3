//! Sensor telemetry gateway.
//!
//! Readers pull line-framed or polled data from serial ports, radio
//! modules, TCP sockets and I2C buses, decode it into
//! [`DecodedFrame`](frame::DecodedFrame)s and push them onto one shared
//! queue. The [`hub`] keeps the set of running readers in line with a JSON
//! [`config`] file.
//!
//! # Crate Structure
//!
//! - [`transport`]: serial links, socket listener, I2C bus handles
//! - [`frame`]: datacodes, node table, line buffering and the decode pipeline
//! - [`reader`]: reader variants, handshakes, settings and polling loops
//! - [`config`]: configuration file model and change detection
//! - [`hub`]: reader lifecycle driven by configuration

pub mod config;
pub mod hub;

/// Re-export transport types.
pub mod transport {
    pub use telehub_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use telehub_frame::*;
}

/// Re-export reader types.
pub mod reader {
    pub use telehub_reader::*;
}
