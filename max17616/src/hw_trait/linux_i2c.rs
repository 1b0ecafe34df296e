//! I2C implementation using the Linux i2c-dev interface.
//!
//! Every transfer goes through the `I2C_RDWR` ioctl. A write issued without
//! STOP is held back and sent in the same combined transaction as the next
//! transfer, which gives the repeated start PMBus reads depend on.

use std::fs::{File, OpenOptions};
use std::os::fd::{AsRawFd, IntoRawFd};
use std::path::{Path, PathBuf};

use nix::errno::Errno;

use super::i2c::{I2c, I2cBus, I2cConfig, I2cError};
use super::{HwError, Result};
use crate::tracing::prelude::*;

mod ioctl {
    pub const I2C_RDWR: u16 = 0x0707;
    pub const I2C_M_RD: u16 = 0x0001;

    /// Mirrors `struct i2c_msg` from <linux/i2c.h>.
    #[repr(C)]
    pub struct I2cMsg {
        pub addr: u16,
        pub flags: u16,
        pub len: u16,
        pub buf: *mut u8,
    }

    /// Mirrors `struct i2c_rdwr_ioctl_data` from <linux/i2c-dev.h>.
    #[repr(C)]
    pub struct I2cRdwrData {
        pub msgs: *mut I2cMsg,
        pub nmsgs: u32,
    }

    nix::ioctl_write_ptr_bad!(i2c_rdwr, I2C_RDWR, I2cRdwrData);
}

use ioctl::{I2cMsg, I2cRdwrData, I2C_M_RD};

/// What a write turns into on the wire.
#[derive(Debug, PartialEq, Eq)]
enum WritePlan {
    /// Nothing sent yet; the bytes wait for the next transfer.
    Hold,
    /// One combined transaction of write segments. `restart_dropped` is set
    /// when the caller asked for no STOP but a write was already held.
    Send {
        segments: Vec<Vec<u8>>,
        restart_dropped: bool,
    },
}

/// The write, if any, waiting to open the next combined transaction.
#[derive(Debug, Default)]
struct HeldWrite {
    pending: Option<Vec<u8>>,
}

impl HeldWrite {
    fn write(&mut self, data: &[u8], stop: bool) -> WritePlan {
        match self.pending.take() {
            None if !stop => {
                self.pending = Some(data.to_vec());
                WritePlan::Hold
            }
            prefix => {
                let mut segments: Vec<Vec<u8>> = prefix.into_iter().collect();
                segments.push(data.to_vec());
                WritePlan::Send {
                    segments,
                    restart_dropped: !stop,
                }
            }
        }
    }

    /// Segment to send ahead of a read, consuming it.
    fn take_for_read(&mut self) -> Option<Vec<u8>> {
        self.pending.take()
    }

    fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// A `/dev/i2c-N` adapter.
#[derive(Debug, Clone)]
pub struct LinuxI2cBus {
    path: PathBuf,
}

impl LinuxI2cBus {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl I2cBus for LinuxI2cBus {
    type Device = LinuxI2cDevice;

    fn open(&mut self, config: &I2cConfig) -> Result<LinuxI2cDevice> {
        if config.address > 0x7F {
            return Err(HwError::InvalidParameter(format!(
                "0x{:02x} is not a 7-bit address",
                config.address
            )));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)?;

        // i2c-dev has no per-client clock control; the adapter's device-tree
        // setting wins.
        debug!(
            "Opened {} for device 0x{:02x} (requested {} Hz)",
            self.path.display(),
            config.address,
            config.speed_hz
        );

        Ok(LinuxI2cDevice {
            file,
            address: config.address,
            held: HeldWrite::default(),
        })
    }
}

/// Session with one device on a Linux i2c-dev adapter.
#[derive(Debug)]
pub struct LinuxI2cDevice {
    file: File,
    address: u8,
    held: HeldWrite,
}

impl LinuxI2cDevice {
    fn write_msg(&self, data: &mut [u8]) -> I2cMsg {
        I2cMsg {
            addr: self.address as u16,
            flags: 0,
            len: data.len() as u16,
            buf: data.as_mut_ptr(),
        }
    }

    fn transfer(&self, msgs: &mut [I2cMsg]) -> Result<()> {
        let data = I2cRdwrData {
            msgs: msgs.as_mut_ptr(),
            nmsgs: msgs.len() as u32,
        };

        // SAFETY: every message points into a buffer that outlives this call
        // and whose length matches `len`.
        let res = unsafe { ioctl::i2c_rdwr(self.file.as_raw_fd(), &data) };
        res.map(|_| ()).map_err(|errno| self.map_errno(errno))
    }

    fn map_errno(&self, errno: Errno) -> HwError {
        match errno {
            Errno::ENXIO | Errno::EREMOTEIO => I2cError::NoAck(self.address).into(),
            Errno::EAGAIN => I2cError::ArbitrationLost.into(),
            Errno::EIO => I2cError::BusError.into(),
            other => HwError::Io(other.into()),
        }
    }
}

impl I2c for LinuxI2cDevice {
    fn write(&mut self, data: &[u8], stop: bool) -> Result<()> {
        let (mut segments, restart_dropped) = match self.held.write(data, stop) {
            WritePlan::Hold => return Ok(()),
            WritePlan::Send {
                segments,
                restart_dropped,
            } => (segments, restart_dropped),
        };

        let mut msgs: Vec<I2cMsg> = segments
            .iter_mut()
            .map(|segment| self.write_msg(segment))
            .collect();
        self.transfer(&mut msgs)?;

        if restart_dropped {
            warn!("Dropping repeated start after back-to-back writes");
        }
        Ok(())
    }

    fn read(&mut self, buffer: &mut [u8], stop: bool) -> Result<()> {
        if !stop {
            trace!("i2c-dev always ends a read with STOP");
        }

        let mut prefix = self.held.take_for_read();
        let mut msgs = Vec::with_capacity(2);
        if let Some(prefix) = prefix.as_mut() {
            msgs.push(self.write_msg(prefix));
        }
        msgs.push(I2cMsg {
            addr: self.address as u16,
            flags: I2C_M_RD,
            len: buffer.len() as u16,
            buf: buffer.as_mut_ptr(),
        });
        self.transfer(&mut msgs)
    }

    fn close(self) -> Result<()> {
        if self.held.is_pending() {
            warn!("Closing session with an unsent write");
        }
        nix::unistd::close(self.file.into_raw_fd())
            .map_err(|errno| HwError::Io(errno.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_without_stop_is_held_for_read() {
        let mut held = HeldWrite::default();

        assert_eq!(held.write(&[0x88], false), WritePlan::Hold);
        assert!(held.is_pending());
        assert_eq!(held.take_for_read(), Some(vec![0x88]));
        assert!(!held.is_pending());
    }

    #[test]
    fn test_write_with_stop_sends_alone() {
        let mut held = HeldWrite::default();

        assert_eq!(
            held.write(&[0x01, 0x80], true),
            WritePlan::Send {
                segments: vec![vec![0x01, 0x80]],
                restart_dropped: false
            }
        );
        assert!(!held.is_pending());
    }

    #[test]
    fn test_held_write_leads_next_write() {
        let mut held = HeldWrite::default();
        held.write(&[0xD1], false);

        assert_eq!(
            held.write(&[0x40], true),
            WritePlan::Send {
                segments: vec![vec![0xD1], vec![0x40]],
                restart_dropped: false
            }
        );
        assert!(!held.is_pending());
    }

    #[test]
    fn test_back_to_back_writes_without_stop_drop_restart() {
        let mut held = HeldWrite::default();
        held.write(&[0x88], false);

        assert_eq!(
            held.write(&[0x8B], false),
            WritePlan::Send {
                segments: vec![vec![0x88], vec![0x8B]],
                restart_dropped: true
            }
        );
        // The second write is sent, not held
        assert!(!held.is_pending());
    }

    #[test]
    fn test_read_with_nothing_held() {
        let mut held = HeldWrite::default();
        assert_eq!(held.take_for_read(), None);
    }
}
