//! I2C hardware abstraction trait.

use super::Result;

/// I2C-specific errors
#[derive(Debug, thiserror::Error)]
pub enum I2cError {
    /// No acknowledgment from device
    #[error("No acknowledgment from device at address 0x{0:02x}")]
    NoAck(u8),

    /// Bus arbitration lost
    #[error("Bus arbitration lost")]
    ArbitrationLost,

    /// Bus error
    #[error("Bus error")]
    BusError,
}

/// Parameters used to open a session with one device on a bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I2cConfig {
    /// 7-bit device address
    pub address: u8,
    /// Bus clock in Hz
    pub speed_hz: u32,
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self {
            address: 0x16,
            speed_hz: 100_000,
        }
    }
}

/// An open session with a single device.
///
/// Each call blocks until the transfer completes. `stop` controls whether a
/// STOP condition ends the transfer; passing `false` to [`I2c::write`] and
/// then reading gives the repeated-start pattern PMBus reads need.
pub trait I2c {
    /// Write data to the device.
    fn write(&mut self, data: &[u8], stop: bool) -> Result<()>;

    /// Fill `buffer` with data read from the device.
    fn read(&mut self, buffer: &mut [u8], stop: bool) -> Result<()>;

    /// Close the session.
    fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// A bus that hands out device sessions.
pub trait I2cBus {
    type Device: I2c;

    /// Open a session keyed by address and bus speed.
    fn open(&mut self, config: &I2cConfig) -> Result<Self::Device>;
}
