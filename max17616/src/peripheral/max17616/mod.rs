//! MAX17616/MAX17616A Protector Driver
//!
//! This module provides a driver for the Analog Devices (Maxim) MAX17616
//! 3V to 80V current limiter / surge protector with PMBus interface.
//!
//! Datasheet: <https://www.analog.com/media/en/technical-documentation/data-sheets/MAX17616-MAX17616A.pdf>

mod faults;
mod identify;
mod registers;
mod status;
mod telemetry;

pub use faults::{FaultDescriber, FaultTable};
pub use identify::{ChipInfo, ChipVariant, CHIP_INFO};
pub use registers::{
    CurrentLimitMode, IstartRatio, NominalVoltage, OvercurrentLimit, OvercurrentTimeout,
    PgoodThreshold, RegisterField, VoutUvFaultConfig,
};
pub use status::{FaultGroup, Status};
pub use telemetry::{Quantity, Telemetry, TelemetryValid};

use crate::error::{Error, Result};
use crate::hw_trait::{I2c, I2cBus, I2cConfig};
use crate::tracing::prelude::*;

use super::pmbus::{commands, Capability, Pmbus, OPERATION_ON};

/// Parameters for [`Max17616::init`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitParams {
    pub i2c: I2cConfig,
}

/// An identified, enabled MAX17616.
pub struct Max17616<I2C> {
    pmbus: Pmbus<I2C>,
    variant: ChipVariant,
    info: &'static ChipInfo,
}

impl<I2C: I2c> Max17616<I2C> {
    /// Open a session, identify the part, clear faults and enable the output.
    ///
    /// If anything after opening fails the session is closed before the
    /// error is returned.
    pub fn init<B>(bus: &mut B, params: &InitParams) -> Result<Self>
    where
        B: I2cBus<Device = I2C>,
    {
        debug!(
            "Initializing MAX17616 at 0x{:02X}, {} Hz",
            params.i2c.address, params.i2c.speed_hz
        );

        let mut pmbus = Pmbus::new(bus.open(&params.i2c)?);

        match Self::bring_up(&mut pmbus) {
            Ok(variant) => {
                info!("{} ready at 0x{:02X}", variant, params.i2c.address);
                Ok(Self {
                    pmbus,
                    variant,
                    info: &CHIP_INFO,
                })
            }
            Err(e) => {
                error!("MAX17616 initialization failed: {}", e);
                if let Err(close_err) = pmbus.into_inner().close() {
                    warn!("Failed to close session after init error: {}", close_err);
                }
                Err(e)
            }
        }
    }

    fn bring_up(pmbus: &mut Pmbus<I2C>) -> Result<ChipVariant> {
        let variant = identify::identify(pmbus, &CHIP_INFO)?;
        pmbus.send_command(commands::CLEAR_FAULTS)?;
        pmbus.write_byte(commands::OPERATION, OPERATION_ON)?;
        Ok(variant)
    }

    /// Close the session. The handle is gone either way.
    pub fn remove(self) -> Result<()> {
        debug!("Removing {}", self.variant);
        self.pmbus.into_inner().close()?;
        Ok(())
    }

    pub fn variant(&self) -> ChipVariant {
        self.variant
    }

    pub fn chip_info(&self) -> &'static ChipInfo {
        self.info
    }

    pub fn clear_faults(&mut self) -> Result<()> {
        self.pmbus.send_command(commands::CLEAR_FAULTS)
    }

    pub fn read_status(&mut self) -> Result<Status> {
        status::read_status(&mut self.pmbus)
    }

    pub fn read_status_byte(&mut self) -> Result<u8> {
        self.pmbus.read_byte(commands::STATUS_BYTE)
    }

    /// Read one group register regardless of STATUS_WORD.
    pub fn read_status_register(&mut self, group: FaultGroup) -> Result<u8> {
        self.pmbus.read_byte(group.command())
    }

    pub fn read_capability(&mut self) -> Result<Capability> {
        let raw = self.pmbus.read_byte(commands::CAPABILITY)?;
        Ok(Capability::from_bits_truncate(raw))
    }

    pub fn read_manufacturer_revision(&mut self) -> Result<String> {
        let mut buf = vec![0u8; self.info.mfr_revision.len()];
        let len = self.pmbus.read_block(commands::MFR_REVISION, &mut buf)?;
        Ok(String::from_utf8_lossy(&buf[..len]).into_owned())
    }

    pub fn read_value(&mut self, quantity: Quantity) -> Result<i64> {
        telemetry::read_value(&mut self.pmbus, quantity)
    }

    /// Read all telemetry. Individual failures only clear their valid bit.
    pub fn read_telemetry(&mut self) -> Telemetry {
        telemetry::read_telemetry(&mut self.pmbus)
    }

    pub fn operation_enabled(&mut self) -> Result<bool> {
        let raw = self.pmbus.read_byte(commands::OPERATION)?;
        Ok(raw & OPERATION_ON != 0)
    }

    pub fn set_operation(&mut self, enabled: bool) -> Result<()> {
        let value = if enabled { OPERATION_ON } else { 0x00 };
        self.pmbus.write_byte(commands::OPERATION, value)
    }

    /// Read and decode a configuration register.
    pub fn read_setting<F: RegisterField>(&mut self) -> Result<F> {
        let raw = self.pmbus.read_byte(F::COMMAND)?;
        F::from_raw(raw).ok_or(Error::InvalidRegisterValue {
            register: F::NAME,
            raw,
        })
    }

    pub fn write_setting<F: RegisterField>(&mut self, value: F) -> Result<()> {
        self.pmbus.write_byte(F::COMMAND, value.to_raw())
    }

    pub fn current_limit_mode(&mut self) -> Result<CurrentLimitMode> {
        self.read_setting()
    }

    pub fn set_current_limit_mode(&mut self, mode: CurrentLimitMode) -> Result<()> {
        self.write_setting(mode)
    }

    pub fn istart_ratio(&mut self) -> Result<IstartRatio> {
        self.read_setting()
    }

    pub fn set_istart_ratio(&mut self, ratio: IstartRatio) -> Result<()> {
        self.write_setting(ratio)
    }

    pub fn overcurrent_timeout(&mut self) -> Result<OvercurrentTimeout> {
        self.read_setting()
    }

    pub fn set_overcurrent_timeout(&mut self, timeout: OvercurrentTimeout) -> Result<()> {
        self.write_setting(timeout)
    }

    pub fn overcurrent_limit(&mut self) -> Result<OvercurrentLimit> {
        self.read_setting()
    }

    pub fn set_overcurrent_limit(&mut self, limit: OvercurrentLimit) -> Result<()> {
        self.write_setting(limit)
    }

    pub fn vout_uv_fault_config(&mut self) -> Result<VoutUvFaultConfig> {
        self.read_setting()
    }

    pub fn set_vout_uv_fault_config(&mut self, config: VoutUvFaultConfig) -> Result<()> {
        self.write_setting(config)
    }
}
