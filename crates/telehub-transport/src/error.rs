use std::path::PathBuf;

/// Errors that can occur while opening or using a transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open a serial device.
    #[error("could not open serial port {path} @ {baud} bit/s: {message}")]
    Open {
        path: PathBuf,
        baud: u32,
        message: String,
    },

    /// Failed to open a device node other than a serial port.
    #[error("could not open device {path}: {source}")]
    Device {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to bind a listening socket.
    #[error("could not open port {port}: {source}")]
    Bind { port: u16, source: std::io::Error },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on an open transport.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An I2C transfer with a device failed.
    #[error("i2c device {address}: {message}")]
    Bus { address: u16, message: String },

    /// The driver needed for this transport is not available.
    #[error("{0} support not available")]
    DriverUnavailable(&'static str),
}

impl TransportError {
    /// Whether this error means "nothing to read right now" rather than a fault.
    pub fn is_idle(&self) -> bool {
        matches!(
            self,
            TransportError::Io(err) if matches!(
                err.kind(),
                std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
            )
        )
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
