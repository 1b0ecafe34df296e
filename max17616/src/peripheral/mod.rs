//! PMBus support and the devices built on it.

pub mod max17616;
pub mod pmbus;
