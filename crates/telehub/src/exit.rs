use std::fmt;
use std::io;

use telehub::config::ConfigError;
use telehub::reader::ReaderError;
use telehub::transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const HEALTH_CHECK_FAILED: i32 = 30;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound => USAGE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn reader_error(context: &str, err: ReaderError) -> CliError {
    match err {
        ReaderError::Init(err) => transport_error(context, err),
        ReaderError::Config(_) | ReaderError::SettingRejected { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        ReaderError::DeviceCommunication(_) => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
    }
}

pub fn config_error(context: &str, err: ConfigError) -> CliError {
    match err {
        ConfigError::Io { source, path } => io_error(&format!("{context} {}", path.display()), source),
        ConfigError::Parse { .. } => CliError::new(DATA_INVALID, format!("{context}: {err}")),
    }
}
