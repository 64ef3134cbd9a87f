//! Bus over a Linux `/dev/i2c-N` character device.
//!
//! Every transaction is a single `I2C_RDWR` transfer. A read is a write of the memory
//! address followed by a read with a repeated start, so the device never sees a STOP
//! between the two.

use crate::bus::{AddressWidth, Bus, Connector};
use crate::error::ErrorKind;
use log::{error, trace};
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;
use std::vec::Vec;

/// `I2C_RDWR` from linux/i2c-dev.h.
const I2C_RDWR: libc::c_ulong = 0x0707;
/// `I2C_M_RD` from linux/i2c.h.
const I2C_M_RD: u16 = 0x0001;

/// Longest message i2c-dev accepts in one `I2C_RDWR` transfer.
const I2C_MSG_MAX: usize = 8192;

/// `struct i2c_msg`.
#[repr(C)]
struct I2cMsg {
    addr: u16,
    flags: u16,
    len: u16,
    buf: *mut u8,
}

/// `struct i2c_rdwr_ioctl_data`.
#[repr(C)]
struct I2cRdwrData {
    msgs: *mut I2cMsg,
    nmsgs: u32,
}

fn msg_len(len: usize) -> Result<u16, ErrorKind> {
    if len > I2C_MSG_MAX {
        error!("i2c message of {} bytes exceeds {}", len, I2C_MSG_MAX);
        return Err(ErrorKind::Transport);
    }
    Ok(len as u16)
}

fn write_msg(device: u8, data: &mut [u8]) -> Result<I2cMsg, ErrorKind> {
    Ok(I2cMsg {
        addr: device as u16,
        flags: 0,
        len: msg_len(data.len())?,
        buf: data.as_mut_ptr(),
    })
}

fn read_msg(device: u8, data: &mut [u8]) -> Result<I2cMsg, ErrorKind> {
    Ok(I2cMsg {
        addr: device as u16,
        flags: I2C_M_RD,
        len: msg_len(data.len())?,
        buf: data.as_mut_ptr(),
    })
}

#[derive(Debug, Clone)]
pub struct I2cDevConnector {
    path: PathBuf,
}

impl I2cDevConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        I2cDevConnector { path: path.into() }
    }
}

impl Connector for I2cDevConnector {
    type Bus = I2cDevBus;

    fn connect(&mut self) -> Result<I2cDevBus, ErrorKind> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(|e| {
                error!("Opening {} failed: {}", self.path.display(), e);
                ErrorKind::Transport
            })?;
        Ok(I2cDevBus { file })
    }
}

pub struct I2cDevBus {
    file: File,
}

impl I2cDevBus {
    fn transfer(&mut self, msgs: &mut [I2cMsg]) -> Result<(), ErrorKind> {
        let mut data = I2cRdwrData {
            msgs: msgs.as_mut_ptr(),
            nmsgs: msgs.len() as u32,
        };
        // SAFETY: every message points into a buffer that outlives this call, with `len`
        // matching the buffer length, and the descriptor is owned by `self.file`.
        let ret = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                I2C_RDWR as _,
                &mut data as *mut I2cRdwrData,
            )
        };
        if ret < 0 {
            error!("i2c transfer failed: {}", std::io::Error::last_os_error());
            return Err(ErrorKind::Transport);
        }
        Ok(())
    }
}

impl Bus for I2cDevBus {
    fn read_memory(
        &mut self,
        device: u8,
        offset: u32,
        width: AddressWidth,
        data: &mut [u8],
    ) -> Result<(), ErrorKind> {
        trace!("i2c rd {:#x} off: {} len: {}", device, offset, data.len());
        let mut addr = [0u8; 2];
        let n = width.encode(offset, &mut addr);
        let mut msgs = [write_msg(device, &mut addr[..n])?, read_msg(device, data)?];
        self.transfer(&mut msgs)
    }

    fn write_memory(
        &mut self,
        device: u8,
        offset: u32,
        width: AddressWidth,
        data: &[u8],
    ) -> Result<(), ErrorKind> {
        trace!("i2c wr {:#x} off: {} len: {}", device, offset, data.len());
        let mut addr = [0u8; 2];
        let n = width.encode(offset, &mut addr);
        // Address and payload go out as one message.
        let mut payload = Vec::with_capacity(n + data.len());
        payload.extend_from_slice(&addr[..n]);
        payload.extend_from_slice(data);
        let mut msgs = [write_msg(device, &mut payload)?];
        self.transfer(&mut msgs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_adapter() {
        let mut connector = I2cDevConnector::new("/dev/i2c-does-not-exist");
        assert_eq!(connector.connect().err(), Some(ErrorKind::Transport));
    }

    #[test]
    fn test_read_is_address_then_repeated_start_read() {
        let mut addr = [0u8; 2];
        let n = AddressWidth::Sixteen.encode(0x0180, &mut addr);
        let mut data = [0u8; I2C_MSG_MAX];
        let msgs = [
            write_msg(0x50, &mut addr[..n]).unwrap(),
            read_msg(0x50, &mut data).unwrap(),
        ];
        assert_eq!((msgs[0].addr, msgs[0].flags, msgs[0].len), (0x50, 0, 2));
        assert_eq!(
            (msgs[1].addr, msgs[1].flags, msgs[1].len),
            (0x50, I2C_M_RD, 8192)
        );
        assert_eq!(msgs[1].buf, data.as_mut_ptr());
    }

    #[test]
    fn test_oversized_message_is_rejected() {
        let mut data = std::vec![0u8; I2C_MSG_MAX + 1];
        assert_eq!(read_msg(0x50, &mut data).err(), Some(ErrorKind::Transport));
    }
}
