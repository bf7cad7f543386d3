use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{SerialLink, SerialOpener};

/// Serial port backed by the `serialport` crate.
///
/// Opened with a zero read timeout so polling never stalls the reader loop.
pub struct SerialPortLink {
    port: Box<dyn serialport::SerialPort>,
    path: PathBuf,
    baud: u32,
}

impl SerialPortLink {
    /// Open the serial device at `path` with the given speed.
    pub fn open(path: impl AsRef<Path>, baud: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let port = serialport::new(path.to_string_lossy(), baud)
            .timeout(Duration::ZERO)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .open()
            .map_err(|err| TransportError::Open {
                path: path.clone(),
                baud,
                message: err.to_string(),
            })?;

        debug!(?path, baud, "opened serial port");

        Ok(Self { port, path, baud })
    }

    /// The device path this link was opened on.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The configured line speed.
    pub fn baud(&self) -> u32 {
        self.baud
    }
}

impl SerialLink for SerialPortLink {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        let pending = self
            .port
            .bytes_to_read()
            .map_err(|err| TransportError::Io(err.into()))? as usize;
        if pending == 0 || buf.is_empty() {
            return Ok(0);
        }

        let want = pending.min(buf.len());
        match self.port.read(&mut buf[..want]) {
            Ok(n) => Ok(n),
            Err(err) if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => Ok(0),
            Err(err) if err.kind() == ErrorKind::Interrupted => Ok(0),
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }

    fn discard_input(&mut self) -> Result<()> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(|err| TransportError::Io(err.into()))
    }

    fn describe(&self) -> String {
        format!("{} @ {} bit/s", self.path.display(), self.baud)
    }
}

impl Drop for SerialPortLink {
    fn drop(&mut self) {
        debug!(path = ?self.path, "closing serial port");
    }
}

/// Opens [`SerialPortLink`]s on the local machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSerialOpener;

impl SerialOpener for SystemSerialOpener {
    fn open(&self, path: &Path, baud: u32) -> Result<Box<dyn SerialLink>> {
        Ok(Box::new(SerialPortLink::open(path, baud)?))
    }
}

/// Names of serial ports visible on this machine.
pub fn available_ports() -> Vec<String> {
    serialport::available_ports()
        .map(|ports| ports.into_iter().map(|p| p.port_name).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_missing_device_is_init_error() {
        let result = SerialPortLink::open("/dev/telehub-no-such-tty", 9600);
        assert!(matches!(
            result,
            Err(TransportError::Open { baud: 9600, .. })
        ));
    }

    #[test]
    fn system_opener_propagates_open_error() {
        let opener = SystemSerialOpener;
        let result = opener.open(Path::new("/dev/telehub-no-such-tty"), 57600);
        assert!(matches!(result, Err(TransportError::Open { .. })));
    }
}
