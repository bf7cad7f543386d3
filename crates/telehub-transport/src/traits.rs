use std::path::Path;

use crate::error::Result;

/// A byte-oriented serial connection owned by exactly one reader.
///
/// Reads never block: when nothing is pending they return `Ok(0)`.
pub trait SerialLink: Send {
    /// Read whatever bytes are currently available into `buf`.
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write a complete command string to the device.
    fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Drop any unread input held by the driver.
    fn discard_input(&mut self) -> Result<()>;

    /// Human-readable identity for diagnostics (path and speed).
    fn describe(&self) -> String;
}

/// Opens serial links at a given path and speed.
///
/// Radio bring-up needs to open the same device several times while probing
/// speeds, so readers receive an opener rather than a single link.
pub trait SerialOpener: Send + Sync {
    fn open(&self, path: &Path, baud: u32) -> Result<Box<dyn SerialLink>>;
}

impl<F> SerialOpener for F
where
    F: Fn(&Path, u32) -> Result<Box<dyn SerialLink>> + Send + Sync,
{
    fn open(&self, path: &Path, baud: u32) -> Result<Box<dyn SerialLink>> {
        self(path, baud)
    }
}

/// Addressed access to devices on an I2C bus.
pub trait I2cBus: Send {
    /// Send a single command byte to the device at `address`.
    fn write_byte(&mut self, address: u16, value: u8) -> Result<()>;

    /// Read `len` bytes starting at `register` from the device at `address`.
    fn read_block(&mut self, address: u16, register: u8, len: u8) -> Result<Vec<u8>>;
}

impl<T: SerialLink + ?Sized> SerialLink for Box<T> {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read_available(buf)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        (**self).write_all(data)
    }

    fn discard_input(&mut self) -> Result<()> {
        (**self).discard_input()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

impl<T: I2cBus + ?Sized> I2cBus for Box<T> {
    fn write_byte(&mut self, address: u16, value: u8) -> Result<()> {
        (**self).write_byte(address, value)
    }

    fn read_block(&mut self, address: u16, register: u8, len: u8) -> Result<Vec<u8>> {
        (**self).read_block(address, register, len)
    }
}
