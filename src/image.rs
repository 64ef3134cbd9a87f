//! EEPROM image kept in a host file, for running without hardware.

use crate::bus::{AddressWidth, Bus, Connector};
use crate::error::ErrorKind;
use log::{debug, error, info};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::vec;

/// Opens (or creates) an image file of `capacity` bytes. A new image starts out
/// 0xFF-filled, like a blank part.
#[derive(Debug, Clone)]
pub struct ImageConnector {
    path: PathBuf,
    capacity: usize,
}

impl ImageConnector {
    pub fn new(path: impl Into<PathBuf>, capacity: usize) -> Self {
        ImageConnector {
            path: path.into(),
            capacity,
        }
    }
}

fn transport(e: std::io::Error) -> ErrorKind {
    error!("Image I/O failed: {}", e);
    ErrorKind::Transport
}

impl Connector for ImageConnector {
    type Bus = ImageBus;

    fn connect(&mut self) -> Result<ImageBus, ErrorKind> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&self.path)
            .map_err(transport)?;
        let len = file.metadata().map_err(transport)?.len() as usize;
        if len < self.capacity {
            info!(
                "Extending image {} from {} to {} bytes",
                self.path.display(),
                len,
                self.capacity
            );
            file.seek(SeekFrom::Start(len as u64)).map_err(transport)?;
            file.write_all(&vec![0xFFu8; self.capacity - len])
                .map_err(transport)?;
            file.flush().map_err(transport)?;
        }
        Ok(ImageBus {
            file,
            capacity: self.capacity,
        })
    }
}

pub struct ImageBus {
    file: File,
    capacity: usize,
}

impl ImageBus {
    fn seek(&mut self, offset: u32, len: usize) -> Result<(), ErrorKind> {
        match (offset as usize).checked_add(len) {
            Some(end) if end <= self.capacity => {}
            _ => {
                error!("Image access {}+{} past {}", offset, len, self.capacity);
                return Err(ErrorKind::Transport);
            }
        }
        self.file
            .seek(SeekFrom::Start(offset as u64))
            .map_err(transport)?;
        Ok(())
    }
}

impl Bus for ImageBus {
    fn read_memory(
        &mut self,
        device: u8,
        offset: u32,
        _width: AddressWidth,
        data: &mut [u8],
    ) -> Result<(), ErrorKind> {
        debug!("image rd dev: {:#x} off: {} len: {}", device, offset, data.len());
        self.seek(offset, data.len())?;
        self.file.read_exact(data).map_err(transport)
    }

    fn write_memory(
        &mut self,
        device: u8,
        offset: u32,
        _width: AddressWidth,
        data: &[u8],
    ) -> Result<(), ErrorKind> {
        debug!("image wr dev: {:#x} off: {} len: {}", device, offset, data.len());
        self.seek(offset, data.len())?;
        self.file.write_all(data).map_err(transport)?;
        self.file.flush().map_err(transport)
    }
}
