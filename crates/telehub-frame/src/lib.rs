//! Telemetry frame assembly and decoding.
//!
//! Sensor nodes send lines of whitespace-separated numbers:
//!
//! ```text
//! <node> <v1> <v2> ... <vn>\r\n
//! ```
//!
//! Values are either plain numbers or the little-endian bytes of binary
//! readings, interpreted per node through [`Datacode`]s. This crate turns
//! raw byte streams into lines ([`LineBuffer`], [`LineReader`]) and lines into
//! typed [`DecodedFrame`]s ([`FrameDecoder`]).

pub mod datacode;
pub mod decoder;
pub mod error;
pub mod frame;
pub mod line;
pub mod nodes;
pub mod validate;

pub use datacode::{Datacode, Value};
pub use decoder::{now_timestamp, DecodeSettings, FrameDecoder};
pub use error::{FrameError, Result};
pub use frame::{DecodedFrame, PauseMode, RawFrame};
pub use line::{LineBuffer, LineReader, DEFAULT_MAX_LINE, DELIMITER};
pub use nodes::{CodecFacts, NodeEncoding, NodeTable, SharedNodeTable};
pub use validate::{validate_generic, FrameValidator, GenericValidator, Validated};
