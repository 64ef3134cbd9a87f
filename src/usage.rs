use crate::bus::{Connector, Delay};
use crate::session::Session;
use crate::storage::Geometry;
use alloc::string::String;
use alloc::vec::Vec;
use log::{debug, warn};

/// Usage snapshot computed on demand.
///
/// `total` is the raw capacity of the device, not what the filesystem can actually hold.
/// `used` sums the contents of every readable file; files that could not be read are
/// listed in `skipped` and left out of the sum. The scan takes no lock, so concurrent
/// writers can leave `used` reflecting a mix of states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageInfo {
    pub total: usize,
    pub used: usize,
    pub free: usize,
    pub block_size: usize,
    pub block_count: usize,
    pub skipped: Vec<String>,
}

impl StorageInfo {
    /// Reported while nothing is mounted.
    pub fn unavailable(geometry: &Geometry) -> Self {
        StorageInfo {
            total: 0,
            used: 0,
            free: 0,
            block_size: geometry.block_size,
            block_count: geometry.block_count,
            skipped: Vec::new(),
        }
    }

    /// True when every file was read.
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

impl<C: Connector, DL: Delay + Clone> Session<C, DL> {
    pub fn storage_info(&mut self) -> StorageInfo {
        let geometry = self.geometry();
        let names = match self.volume() {
            Ok(volume) => volume.list(),
            Err(_) => return StorageInfo::unavailable(&geometry),
        };

        let total = geometry.capacity();
        let mut used = 0;
        let mut skipped = Vec::new();
        for name in names {
            // After a transport failure the bus is dropped and every later read reports
            // Disconnected, so the rest of the scan is skipped too.
            match self.with_volume(|volume| volume.read(&name)) {
                Ok(contents) => used += contents.len(),
                Err(e) => {
                    warn!("Skipping {} in usage scan: {}", name, e);
                    skipped.push(name);
                }
            }
        }
        debug!(
            "Usage scan: {} of {} bytes, {} skipped",
            used,
            total,
            skipped.len()
        );

        StorageInfo {
            total,
            used,
            free: total.saturating_sub(used),
            block_size: geometry.block_size,
            block_count: geometry.block_count,
            skipped,
        }
    }
}
