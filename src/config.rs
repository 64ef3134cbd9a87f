use crate::bus::AddressWidth;
use crate::error::ErrorKind;
use crate::fs::check_geometry;
use crate::storage::Geometry;
use core::time::Duration;
use log::error;

/// What `erase` does to a region of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Erase {
    /// EEPROM cells are overwritten in place, so nothing is issued.
    Skip,
    /// Write the pattern over the region.
    Fill(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub device_address: u8,
    pub address_width: AddressWidth,
    pub geometry: Geometry,
    /// Largest write the device accepts in one transaction.
    pub page_size: usize,
    /// Wait after each page write while the device commits it.
    pub settle_delay: Duration,
    pub erase: Erase,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            device_address: 0x50,
            address_width: AddressWidth::Sixteen,
            geometry: Geometry::default(),
            page_size: 64,
            settle_delay: Duration::from_millis(5),
            erase: Erase::Skip,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ErrorKind> {
        let geometry = &self.geometry;
        if geometry.block_size == 0 || geometry.block_count == 0 || self.page_size == 0 {
            error!("Zero sized geometry or page: {:?}", self);
            return Err(ErrorKind::InvalidConfig);
        }
        check_geometry(geometry)?;
        if geometry.block_size % self.page_size != 0 {
            error!(
                "Block size {} is not a multiple of page size {}",
                geometry.block_size, self.page_size
            );
            return Err(ErrorKind::InvalidConfig);
        }
        let capacity = geometry.block_size.checked_mul(geometry.block_count);
        if !matches!(capacity, Some(c) if c <= self.address_width.span()) {
            error!(
                "Geometry {:?} exceeds the {:?} address space",
                geometry, self.address_width
            );
            return Err(ErrorKind::InvalidConfig);
        }
        if self.device_address > 0x7F {
            error!("Device address 0x{:x} is not 7-bit", self.device_address);
            return Err(ErrorKind::InvalidConfig);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = Config::default();
        assert_eq!(config.geometry.capacity(), 32768);
        assert_eq!(config.settle_delay, Duration::from_millis(5));
        config.validate().unwrap();
    }

    #[test]
    fn test_rejects_unaligned_block_size() {
        let config = Config {
            page_size: 48,
            ..Config::default()
        };
        assert_eq!(config.validate(), Err(ErrorKind::InvalidConfig));
    }

    #[test]
    fn test_rejects_capacity_past_address_width() {
        let config = Config {
            address_width: AddressWidth::Eight,
            ..Config::default()
        };
        assert_eq!(config.validate(), Err(ErrorKind::InvalidConfig));

        let config = Config {
            geometry: Geometry {
                block_size: 512,
                block_count: 129,
            },
            ..Config::default()
        };
        assert_eq!(config.validate(), Err(ErrorKind::InvalidConfig));
    }

    #[test]
    fn test_rejects_geometry_without_room_for_files() {
        // Blocks no larger than a file head.
        let config = Config {
            geometry: Geometry {
                block_size: 64,
                block_count: 512,
            },
            ..Config::default()
        };
        assert_eq!(config.validate(), Err(ErrorKind::InvalidConfig));

        // Nothing besides the super block.
        let config = Config {
            geometry: Geometry {
                block_size: 512,
                block_count: 1,
            },
            ..Config::default()
        };
        assert_eq!(config.validate(), Err(ErrorKind::InvalidConfig));

        let config = Config {
            geometry: Geometry {
                block_size: 128,
                block_count: 2,
            },
            ..Config::default()
        };
        config.validate().unwrap();
    }
}
