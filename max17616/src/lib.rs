//! Driver for the MAX17616/MAX17616A current limiter and surge protector.
//!
//! The device is reached over PMBus on an I2C link. [`hw_trait`] defines the
//! bus interface, [`peripheral::pmbus`] frames PMBus transactions on top of
//! it, and [`peripheral::max17616::Max17616`] is the device handle. The
//! [`shell`] module backs the `max17616-shell` binary.

pub mod config;
pub mod error;
pub mod hw_trait;
pub mod peripheral;
pub mod shell;
pub mod tracing;

pub use error::{Error, Result};
