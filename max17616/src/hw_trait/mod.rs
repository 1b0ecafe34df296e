//! Hardware abstraction layer traits.
//!
//! This module defines the bus interface the driver is written against, so
//! the same driver runs over a Linux i2c-dev adapter or a simulated register
//! file in tests.

pub mod i2c;
#[cfg(target_os = "linux")]
pub mod linux_i2c;
#[cfg(test)]
pub(crate) mod mock;

pub use i2c::{I2c, I2cBus, I2cConfig, I2cError};

/// Common error type for hardware operations
#[derive(Debug, thiserror::Error)]
pub enum HwError {
    /// I/O error from underlying transport
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// I2C-level failure
    #[error(transparent)]
    I2c(#[from] I2cError),

    /// Invalid parameter or argument
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Other hardware-specific error
    #[error("Hardware error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, HwError>;
