use crate::error::ErrorKind;

/// Fixed block layout of a device. `block_size * block_count` is the addressable capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub block_size: usize,
    pub block_count: usize,
}

impl Geometry {
    pub const fn capacity(&self) -> usize {
        self.block_size * self.block_count
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Geometry {
            block_size: 512,
            block_count: 64,
        }
    }
}

/// Byte-addressed storage consumed by the filesystem engine.
pub trait BlockDevice {
    fn read(&mut self, offset: usize, data: &mut [u8]) -> Result<(), ErrorKind>;
    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), ErrorKind>;
    fn erase(&mut self, offset: usize, len: usize) -> Result<(), ErrorKind>;
    fn geometry(&self) -> Geometry;
}

/// Check that `[offset, offset + len)` lies inside the device.
pub(crate) fn check_range(geometry: &Geometry, offset: usize, len: usize) -> Result<(), ErrorKind> {
    match offset.checked_add(len) {
        Some(end) if end <= geometry.capacity() => Ok(()),
        _ => Err(ErrorKind::OutOfBounds),
    }
}
