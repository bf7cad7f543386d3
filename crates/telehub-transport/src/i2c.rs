use crate::error::{Result, TransportError};
use crate::traits::I2cBus;

/// Whether this build can talk to a real I2C bus.
pub const I2C_SUPPORTED: bool = cfg!(all(target_os = "linux", feature = "i2c"));

/// Open I2C bus number `bus_id` (`/dev/i2c-<bus_id>`).
///
/// Fails with [`TransportError::DriverUnavailable`] when the build has no
/// I2C support, and with [`TransportError::Device`] when the bus node is missing.
pub fn open_bus(bus_id: u8) -> Result<Box<dyn I2cBus>> {
    #[cfg(all(target_os = "linux", feature = "i2c"))]
    {
        Ok(Box::new(linux::LinuxBus::open(bus_id)?))
    }

    #[cfg(not(all(target_os = "linux", feature = "i2c")))]
    {
        let _ = bus_id;
        Err(TransportError::DriverUnavailable("i2c"))
    }
}

/// Device node path for a bus number.
pub fn bus_path(bus_id: u8) -> std::path::PathBuf {
    std::path::PathBuf::from(format!("/dev/i2c-{bus_id}"))
}

#[cfg(all(target_os = "linux", feature = "i2c"))]
mod linux {
    use std::collections::HashMap;
    use std::path::PathBuf;

    use i2cdev::core::I2CDevice;
    use i2cdev::linux::LinuxI2CDevice;
    use tracing::{debug, info};

    use super::*;

    /// Linux `/dev/i2c-N` bus. One device handle is opened lazily per address.
    pub(super) struct LinuxBus {
        path: PathBuf,
        devices: HashMap<u16, LinuxI2CDevice>,
    }

    impl LinuxBus {
        pub(super) fn open(bus_id: u8) -> Result<Self> {
            let path = bus_path(bus_id);
            std::fs::metadata(&path).map_err(|source| TransportError::Device {
                path: path.clone(),
                source,
            })?;
            info!(?path, "opened i2c bus");
            Ok(Self {
                path,
                devices: HashMap::new(),
            })
        }

        fn device(&mut self, address: u16) -> Result<&mut LinuxI2CDevice> {
            if !self.devices.contains_key(&address) {
                let device = LinuxI2CDevice::new(&self.path, address).map_err(|err| {
                    TransportError::Bus {
                        address,
                        message: err.to_string(),
                    }
                })?;
                debug!(address, "opened i2c device");
                self.devices.insert(address, device);
            }
            self.devices
                .get_mut(&address)
                .ok_or_else(|| TransportError::Bus {
                    address,
                    message: "device handle missing".to_string(),
                })
        }
    }

    impl I2cBus for LinuxBus {
        fn write_byte(&mut self, address: u16, value: u8) -> Result<()> {
            self.device(address)?
                .smbus_write_byte(value)
                .map_err(|err| TransportError::Bus {
                    address,
                    message: err.to_string(),
                })
        }

        fn read_block(&mut self, address: u16, register: u8, len: u8) -> Result<Vec<u8>> {
            self.device(address)?
                .smbus_read_i2c_block_data(register, len)
                .map_err(|err| TransportError::Bus {
                    address,
                    message: err.to_string(),
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_path_format() {
        assert_eq!(bus_path(1), std::path::PathBuf::from("/dev/i2c-1"));
    }

    #[test]
    #[cfg(not(all(target_os = "linux", feature = "i2c")))]
    fn open_without_driver_is_unavailable() {
        assert!(matches!(
            open_bus(1),
            Err(TransportError::DriverUnavailable("i2c"))
        ));
    }

    #[test]
    #[cfg(all(target_os = "linux", feature = "i2c"))]
    fn open_missing_bus_is_device_error() {
        assert!(matches!(
            open_bus(250),
            Err(TransportError::Device { .. })
        ));
    }
}
