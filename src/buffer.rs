use crate::bus::{AddressWidth, Bus, Delay};
use crate::config::{Config, Erase};
use crate::error::ErrorKind;
use crate::storage::{check_range, BlockDevice, Geometry};
use alloc::vec;
use alloc::vec::Vec;
use core::time::Duration;
use log::{debug, error, trace};

/// Maps the EEPROM's byte address space onto bus transactions.
///
/// Writes are split into chunks of at most `page_size` bytes, each sent in its own
/// transaction at `offset + n * page_size` and followed by the settle delay. Reads are a
/// single sequential transaction.
pub struct EepromBuffer<B: Bus, D: Delay> {
    bus: B,
    delay: D,
    device_address: u8,
    address_width: AddressWidth,
    geometry: Geometry,
    page_size: usize,
    settle_delay: Duration,
    erase: Erase,
}

impl<B: Bus, D: Delay> EepromBuffer<B, D> {
    pub fn new(bus: B, delay: D, config: &Config) -> Self {
        EepromBuffer {
            bus,
            delay,
            device_address: config.device_address,
            address_width: config.address_width,
            geometry: config.geometry,
            page_size: config.page_size,
            settle_delay: config.settle_delay,
            erase: config.erase,
        }
    }

    /// Give the bus handle back, dropping the adapter.
    pub fn into_bus(self) -> B {
        self.bus
    }

    pub fn read_vec(&mut self, offset: usize, len: usize) -> Result<Vec<u8>, ErrorKind> {
        let mut data = vec![0u8; len];
        self.read(offset, &mut data)?;
        Ok(data)
    }

    /// Write a sequence of small integers. Every value must fit in a byte; nothing is sent
    /// otherwise. Chunking is identical to a byte write of the same values.
    pub fn write_values(&mut self, offset: usize, values: &[u32]) -> Result<(), ErrorKind> {
        let bytes = values
            .iter()
            .map(|v| u8::try_from(*v).map_err(|_| ErrorKind::InvalidValue))
            .collect::<Result<Vec<u8>, ErrorKind>>()?;
        self.write(offset, &bytes)
    }

    /// Page size as a usable chunk length. A zero page size cannot split anything.
    fn page_size(&self) -> Result<usize, ErrorKind> {
        if self.page_size == 0 {
            error!("Page size is zero");
            return Err(ErrorKind::InvalidConfig);
        }
        Ok(self.page_size)
    }

    fn write_pages(&mut self, offset: usize, data: &[u8]) -> Result<(), ErrorKind> {
        self.page_size()?;
        for (idx, chunk) in data.chunks(self.page_size).enumerate() {
            let addr = offset + idx * self.page_size;
            trace!("page wr addr: 0x{:x} len: {}", addr, chunk.len());
            self.bus
                .write_memory(self.device_address, addr as u32, self.address_width, chunk)
                .map_err(|e| {
                    error!("Page write at 0x{:x} failed: {:?}", addr, e);
                    e
                })?;
            self.delay.delay(self.settle_delay);
        }
        Ok(())
    }
}

impl<B: Bus, D: Delay> BlockDevice for EepromBuffer<B, D> {
    fn read(&mut self, offset: usize, data: &mut [u8]) -> Result<(), ErrorKind> {
        check_range(&self.geometry, offset, data.len())?;
        if data.is_empty() {
            return Ok(());
        }
        trace!("rd addr: 0x{:x} len: {}", offset, data.len());
        self.bus
            .read_memory(self.device_address, offset as u32, self.address_width, data)
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), ErrorKind> {
        check_range(&self.geometry, offset, data.len())?;
        let page_size = self.page_size()?;
        debug!(
            "wr addr: 0x{:x} len: {} pages: {}",
            offset,
            data.len(),
            (data.len() + page_size - 1) / page_size
        );
        self.write_pages(offset, data)
    }

    fn erase(&mut self, offset: usize, len: usize) -> Result<(), ErrorKind> {
        check_range(&self.geometry, offset, len)?;
        match self.erase {
            Erase::Skip => Ok(()),
            Erase::Fill(pattern) => {
                let page_size = self.page_size()?;
                debug!("erase addr: 0x{:x} len: {} fill: 0x{:x}", offset, len, pattern);
                let page = vec![pattern; page_size];
                let mut pos = 0;
                while pos < len {
                    let n = core::cmp::min(page_size, len - pos);
                    self.write_pages(offset + pos, &page[..n])?;
                    pos += n;
                }
                Ok(())
            }
        }
    }

    fn geometry(&self) -> Geometry {
        self.geometry
    }
}
