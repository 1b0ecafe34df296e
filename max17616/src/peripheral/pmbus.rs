//! PMBus Protocol Support
//!
//! This module provides the PMBus pieces the MAX17616 driver is built on:
//! command codes, STATUS_WORD and CAPABILITY flags, the DIRECT data format,
//! and [`Pmbus`], which frames byte/word/block transactions over an [`I2c`]
//! session.
//!
//! PMBus is a variant of SMBus with extensions for power management.
//! Specification: <https://pmbus.org/specification-documents/>

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::hw_trait::I2c;
use crate::tracing::prelude::*;

/// PMBus command codes used by the MAX17616
pub mod commands {
    pub const OPERATION: u8 = 0x01;
    pub const CLEAR_FAULTS: u8 = 0x03;
    pub const CAPABILITY: u8 = 0x19;
    pub const VOUT_UV_FAULT_LIMIT: u8 = 0x44;
    pub const STATUS_BYTE: u8 = 0x78;
    pub const STATUS_WORD: u8 = 0x79;
    pub const STATUS_VOUT: u8 = 0x7A;
    pub const STATUS_IOUT: u8 = 0x7B;
    pub const STATUS_INPUT: u8 = 0x7C;
    pub const STATUS_TEMPERATURE: u8 = 0x7D;
    pub const STATUS_CML: u8 = 0x7E;
    pub const STATUS_MFR_SPECIFIC: u8 = 0x80;
    pub const READ_VIN: u8 = 0x88;
    pub const READ_VOUT: u8 = 0x8B;
    pub const READ_IOUT: u8 = 0x8C;
    pub const READ_TEMPERATURE_1: u8 = 0x8D;
    pub const PMBUS_REVISION: u8 = 0x98;
    pub const MFR_ID: u8 = 0x99;
    pub const MFR_REVISION: u8 = 0x9B;
    pub const IC_DEVICE_ID: u8 = 0xAD;

    // Maxim manufacturer-specific configuration
    pub const SET_CLMODE: u8 = 0xD1;
    pub const SET_ISTART_RATIO: u8 = 0xD2;
    pub const SET_TSTOC: u8 = 0xD3;
    pub const SET_ISTLIM: u8 = 0xD4;

    /// Name of a command code, for logging.
    pub fn name(command: u8) -> &'static str {
        match command {
            OPERATION => "OPERATION",
            CLEAR_FAULTS => "CLEAR_FAULTS",
            CAPABILITY => "CAPABILITY",
            VOUT_UV_FAULT_LIMIT => "VOUT_UV_FAULT_LIMIT",
            STATUS_BYTE => "STATUS_BYTE",
            STATUS_WORD => "STATUS_WORD",
            STATUS_VOUT => "STATUS_VOUT",
            STATUS_IOUT => "STATUS_IOUT",
            STATUS_INPUT => "STATUS_INPUT",
            STATUS_TEMPERATURE => "STATUS_TEMPERATURE",
            STATUS_CML => "STATUS_CML",
            STATUS_MFR_SPECIFIC => "STATUS_MFR_SPECIFIC",
            READ_VIN => "READ_VIN",
            READ_VOUT => "READ_VOUT",
            READ_IOUT => "READ_IOUT",
            READ_TEMPERATURE_1 => "READ_TEMPERATURE_1",
            PMBUS_REVISION => "PMBUS_REVISION",
            MFR_ID => "MFR_ID",
            MFR_REVISION => "MFR_REVISION",
            IC_DEVICE_ID => "IC_DEVICE_ID",
            SET_CLMODE => "SET_CLMODE",
            SET_ISTART_RATIO => "SET_ISTART_RATIO",
            SET_TSTOC => "SET_TSTOC",
            SET_ISTLIM => "SET_ISTLIM",
            _ => "UNKNOWN",
        }
    }
}

/// OPERATION bit 7: output enabled
pub const OPERATION_ON: u8 = 0x80;

bitflags! {
    /// PMBus STATUS_WORD (0x79) register flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StatusWord: u16 {
        const VOUT = 0x8000;
        const IOUT = 0x4000;
        const INPUT = 0x2000;
        const MFR = 0x1000;
        const PGOOD = 0x0800;
        const FANS = 0x0400;
        const OTHER = 0x0200;
        const UNKNOWN = 0x0100;
        const BUSY = 0x0080;
        const OFF = 0x0040;
        const VOUT_OV = 0x0020;
        const IOUT_OC = 0x0010;
        const VIN_UV = 0x0008;
        const TEMP = 0x0004;
        const CML = 0x0002;
        const NONE = 0x0001;
    }
}

bitflags! {
    /// PMBus CAPABILITY (0x19) register flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capability: u8 {
        const PEC = 0x80;
        const SPEED_1MHZ = 0x40;
        const SPEED_400KHZ = 0x20;
        const SMBALERT = 0x10;
        const IEEE_HALF = 0x08;
        const AVSBUS = 0x04;
    }
}

/// DIRECT data format coefficients
///
/// The device encodes `Y = (m * X + b) * 10^R`; decoding inverts that as
/// `X = (Y * 10^-R - b) / m`. R must lie in -4..=0, so the scale is an
/// integer multiplier and every decoded value, and the product of any two,
/// fits in an `i64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectCoefficients {
    m: i32,
    b: i32,
    r: i8,
}

impl DirectCoefficients {
    pub const MIN_R: i8 = -4;

    /// Panics (at compile time for consts) if `r` is outside -4..=0 or `m`
    /// is zero.
    pub const fn new(m: i32, b: i32, r: i8) -> Self {
        assert!(r <= 0, "fractional DIRECT scale is not supported");
        assert!(r >= Self::MIN_R, "DIRECT scale beyond 10^4 is not supported");
        assert!(m != 0, "DIRECT slope must be nonzero");
        Self { m, b, r }
    }

    /// Convert a raw register word to integer units.
    ///
    /// The word is sign-extended from 16 bits and the division truncates
    /// toward zero; no rounding correction is applied.
    pub fn decode(&self, raw: u16) -> i64 {
        let y = raw as i16 as i64;
        let scale = 10i64.pow(self.r.unsigned_abs() as u32);
        (y * scale - self.b as i64) / self.m as i64
    }
}

/// PMBus transactions over a single device session.
///
/// Reads write the command byte without STOP and then read with STOP
/// (repeated start). Transport errors are returned as soon as they happen;
/// nothing is retried here.
pub struct Pmbus<I2C> {
    i2c: I2C,
}

impl<I2C: I2c> Pmbus<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self { i2c }
    }

    /// Give back the session, e.g. to close it.
    pub fn into_inner(self) -> I2C {
        self.i2c
    }

    /// Send a command with no data (e.g. CLEAR_FAULTS).
    pub fn send_command(&mut self, command: u8) -> Result<()> {
        trace!("send {}", commands::name(command));
        self.i2c.write(&[command], true)?;
        Ok(())
    }

    pub fn read_byte(&mut self, command: u8) -> Result<u8> {
        let mut data = [0u8; 1];
        self.write_read(command, &mut data)?;
        trace!("read {} = 0x{:02X}", commands::name(command), data[0]);
        Ok(data[0])
    }

    pub fn read_word(&mut self, command: u8) -> Result<u16> {
        let mut data = [0u8; 2];
        self.write_read(command, &mut data)?;
        let word = u16::from_le_bytes(data);
        trace!("read {} = 0x{:04X}", commands::name(command), word);
        Ok(word)
    }

    pub fn write_byte(&mut self, command: u8, value: u8) -> Result<()> {
        trace!("write {} = 0x{:02X}", commands::name(command), value);
        self.i2c.write(&[command, value], true)?;
        Ok(())
    }

    /// Read a length-prefixed block into `buf`, returning the payload length.
    ///
    /// If the device declares more bytes than `buf` holds, `buf` is left
    /// untouched and [`Error::SizeMismatch`] is returned.
    pub fn read_block(&mut self, command: u8, buf: &mut [u8]) -> Result<usize> {
        let mut raw = vec![0u8; buf.len() + 1];
        self.write_read(command, &mut raw)?;

        let declared = raw[0] as usize;
        if declared > buf.len() {
            debug!(
                "{} declared {} bytes, buffer holds {}",
                commands::name(command),
                declared,
                buf.len()
            );
            return Err(Error::SizeMismatch {
                declared,
                capacity: buf.len(),
            });
        }

        buf[..declared].copy_from_slice(&raw[1..=declared]);
        trace!("read {} = {:02X?}", commands::name(command), &buf[..declared]);
        Ok(declared)
    }

    fn write_read(&mut self, command: u8, buf: &mut [u8]) -> Result<()> {
        self.i2c.write(&[command], false)?;
        self.i2c.read(buf, true)?;
        Ok(())
    }
}
