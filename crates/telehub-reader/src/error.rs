use telehub_transport::TransportError;

/// Errors raised by readers.
///
/// Only [`ReaderError::Init`] and [`ReaderError::Config`] prevent a reader
/// from running; the others are logged and the affected step is skipped.
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    /// The transport could not be opened or bound.
    #[error("initialisation failed: {0}")]
    Init(#[from] TransportError),

    /// A handshake or device exchange did not complete.
    #[error("device communication failure: {0}")]
    DeviceCommunication(String),

    /// A runtime setting value failed its predicate.
    #[error("'{value}' is not a valid setting for {reader}: {key}")]
    SettingRejected {
        reader: String,
        key: String,
        value: String,
    },

    /// Reader configuration could not be interpreted.
    #[error("invalid reader configuration: {0}")]
    Config(String),
}

impl ReaderError {
    pub(crate) fn device(err: impl std::fmt::Display) -> Self {
        ReaderError::DeviceCommunication(err.to_string())
    }

    /// Whether the error prevents the reader from being constructed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ReaderError::Init(_) | ReaderError::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, ReaderError>;
