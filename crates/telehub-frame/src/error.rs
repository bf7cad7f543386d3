use crate::datacode::Datacode;

/// Reasons a raw frame is rejected.
///
/// None of these stop a reader; the frame is logged and dropped.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FrameError {
    /// Fewer than two tokens (node id plus at least one value).
    #[error("string too short")]
    TooShort,

    /// A token did not parse as a number.
    #[error("non-numerical content: {token:?}")]
    NonNumeric { token: String },

    /// A radio query echo carrying only a signal reading.
    #[error("unreliable content: RSSI {signal}")]
    UnreliableContent { signal: String },

    /// The node id is not a non-negative integer.
    #[error("invalid node id: {token:?}")]
    InvalidNode { token: String },

    /// Payload size differs from the sum of a node's per-value datacodes.
    #[error("data length {len} is not valid for datacodes {codes} (expected {expected})")]
    LengthMismatch {
        len: usize,
        expected: usize,
        codes: String,
    },

    /// Payload size is not a whole number of values.
    #[error("data length {len} is not valid for datacode {code}")]
    NotMultiple { len: usize, code: Datacode },

    /// The payload bytes could not be decoded.
    #[error("unable to decode values for datacode {code}")]
    Decode { code: Datacode },

    /// An unknown datacode symbol.
    #[error("unknown datacode {0:?}")]
    UnknownDatacode(String),

    /// A line grew past the buffer limit without a delimiter.
    #[error("line too long ({size} bytes, max {max})")]
    LineTooLong { size: usize, max: usize },

    /// The underlying transport failed.
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<telehub_transport::TransportError> for FrameError {
    fn from(err: telehub_transport::TransportError) -> Self {
        FrameError::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
