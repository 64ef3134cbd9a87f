//! Two-wire bus transport and the settle-delay provider.

use crate::error::ErrorKind;
use core::time::Duration;

/// Width of the memory address sent ahead of each transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressWidth {
    Eight,
    Sixteen,
}

impl AddressWidth {
    pub const fn bytes(&self) -> usize {
        match self {
            AddressWidth::Eight => 1,
            AddressWidth::Sixteen => 2,
        }
    }

    /// Number of bytes addressable with this width.
    pub const fn span(&self) -> usize {
        1 << (8 * self.bytes())
    }

    /// Big-endian register address as it goes on the wire.
    pub fn encode(&self, offset: u32, out: &mut [u8; 2]) -> usize {
        match self {
            AddressWidth::Eight => {
                out[0] = offset as u8;
                1
            }
            AddressWidth::Sixteen => {
                out.copy_from_slice(&(offset as u16).to_be_bytes());
                2
            }
        }
    }
}

/// Addressed memory transactions against a peripheral.
pub trait Bus {
    fn read_memory(
        &mut self,
        device: u8,
        offset: u32,
        width: AddressWidth,
        data: &mut [u8],
    ) -> Result<(), ErrorKind>;

    fn write_memory(
        &mut self,
        device: u8,
        offset: u32,
        width: AddressWidth,
        data: &[u8],
    ) -> Result<(), ErrorKind>;
}

/// Acquires a bus handle. Failures are reported as `ErrorKind::Transport`.
pub trait Connector {
    type Bus: Bus;

    fn connect(&mut self) -> Result<Self::Bus, ErrorKind>;
}

pub trait Delay {
    fn delay(&mut self, duration: Duration);
}

/// Blocks the calling thread.
#[cfg(feature = "std")]
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

#[cfg(feature = "std")]
impl Delay for StdDelay {
    fn delay(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
