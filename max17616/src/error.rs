//! Common error types for the MAX17616 driver.
//!
//! This module provides a centralized Error enum using thiserror,
//! with conversions from the transport errors underneath it.

use thiserror::Error;

use crate::hw_trait::HwError;

/// Which identification check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mismatch {
    ManufacturerId,
    DeviceId,
    PmbusRevision,
}

impl std::fmt::Display for Mismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let what = match self {
            Mismatch::ManufacturerId => "manufacturer ID",
            Mismatch::DeviceId => "device ID",
            Mismatch::PmbusRevision => "PMBus revision",
        };
        f.write_str(what)
    }
}

/// Main error type for driver operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Identification found something other than a MAX17616
    #[error("Device not detected: {0} mismatch")]
    NotDetected(Mismatch),

    /// Bus failure, passed through untouched
    #[error("Transport error: {0}")]
    Transport(#[from] HwError),

    /// Block read declared more bytes than the caller can hold
    #[error("Block length {declared} exceeds buffer of {capacity} bytes")]
    SizeMismatch { declared: usize, capacity: usize },

    /// Register held a bit pattern with no matching setting
    #[error("Unrecognized {register} value 0x{raw:02X}")]
    InvalidRegisterValue { register: &'static str, raw: u8 },
}

/// Convenience type alias for Results using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
