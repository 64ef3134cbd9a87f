//! A small filesystem for two-wire EEPROMs.
//!
//! The device is reached through a [`Bus`] and exposed as a byte-addressed [`BlockDevice`]
//! by [`EepromBuffer`], which splits writes into device pages. [`EeFs`] keeps a flat
//! namespace of files on top of it, and [`Session`] owns the connection and mount
//! lifecycle along with the file operations an API layer needs.

#![no_std]

extern crate alloc;
#[cfg(any(test, feature = "std"))]
extern crate std;

mod buffer;
mod bus;
mod config;
mod data_block;
mod error;
mod file_block;
mod files;
mod fs;
mod session;
mod storage;
mod super_block;
mod usage;
mod util;

#[cfg(feature = "std")]
mod image;
#[cfg(all(feature = "std", target_os = "linux"))]
mod linux;

#[cfg(test)]
mod tests_util;

pub use buffer::EepromBuffer;
#[cfg(feature = "std")]
pub use bus::StdDelay;
pub use bus::{AddressWidth, Bus, Connector, Delay};
pub use config::{Config, Erase};
pub use error::{ErrorClass, ErrorKind};
pub use files::{FileInfo, SearchHits};
pub use fs::{EeFs, MountError};
#[cfg(feature = "std")]
pub use image::{ImageBus, ImageConnector};
#[cfg(all(feature = "std", target_os = "linux"))]
pub use linux::{I2cDevBus, I2cDevConnector};
pub use session::{Session, Status, Volume};
pub use storage::{BlockDevice, Geometry};
pub use usage::StorageInfo;

/// Longest file name, in bytes.
pub const MAX_NAME_LEN: usize = file_block::NAME_NLEN;
