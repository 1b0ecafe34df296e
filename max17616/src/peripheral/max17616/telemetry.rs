//! Telemetry readings in DIRECT format.

use bitflags::bitflags;
use strum::{Display, EnumIter};

use crate::error::Result;
use crate::hw_trait::I2c;
use crate::peripheral::pmbus::{commands, DirectCoefficients, Pmbus};
use crate::tracing::prelude::*;

pub const VIN: DirectCoefficients = DirectCoefficients::new(512, -18, -1);
pub const VOUT: DirectCoefficients = DirectCoefficients::new(512, -18, -1);
pub const IOUT: DirectCoefficients = DirectCoefficients::new(5845, 80, -1);
pub const TEMPERATURE: DirectCoefficients = DirectCoefficients::new(71, 19653, -1);

/// A single measured or derived value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, Display)]
pub enum Quantity {
    #[strum(to_string = "VIN")]
    Vin,
    #[strum(to_string = "VOUT")]
    Vout,
    #[strum(to_string = "IOUT")]
    Iout,
    #[strum(to_string = "Temperature")]
    Temperature,
    /// VOUT x IOUT
    #[strum(to_string = "Power")]
    Power,
}

impl Quantity {
    pub fn unit(self) -> &'static str {
        match self {
            Quantity::Vin | Quantity::Vout => "V",
            Quantity::Iout => "A",
            Quantity::Temperature => "°C",
            Quantity::Power => "W",
        }
    }

    /// Register and coefficients for measured quantities; `None` for power.
    fn source(self) -> Option<(u8, DirectCoefficients)> {
        match self {
            Quantity::Vin => Some((commands::READ_VIN, VIN)),
            Quantity::Vout => Some((commands::READ_VOUT, VOUT)),
            Quantity::Iout => Some((commands::READ_IOUT, IOUT)),
            Quantity::Temperature => Some((commands::READ_TEMPERATURE_1, TEMPERATURE)),
            Quantity::Power => None,
        }
    }

    fn valid_flag(self) -> TelemetryValid {
        match self {
            Quantity::Vin => TelemetryValid::VIN,
            Quantity::Vout => TelemetryValid::VOUT,
            Quantity::Iout => TelemetryValid::IOUT,
            Quantity::Temperature => TelemetryValid::TEMPERATURE,
            Quantity::Power => TelemetryValid::POWER,
        }
    }
}

bitflags! {
    /// Which fields of a [`Telemetry`] snapshot hold real readings
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TelemetryValid: u8 {
        const VIN = 1 << 0;
        const VOUT = 1 << 1;
        const IOUT = 1 << 3;
        const TEMPERATURE = 1 << 4;
        const POWER = 1 << 5;
    }
}

/// One pass over all telemetry registers.
///
/// Fields whose flag is missing from `valid` are zero and must not be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Telemetry {
    pub vin: i64,
    pub vout: i64,
    pub iout: i64,
    pub temperature: i64,
    pub power: i64,
    pub valid: TelemetryValid,
}

impl Telemetry {
    /// The value for `quantity`, if it was read successfully.
    pub fn get(&self, quantity: Quantity) -> Option<i64> {
        if !self.valid.contains(quantity.valid_flag()) {
            return None;
        }
        Some(match quantity {
            Quantity::Vin => self.vin,
            Quantity::Vout => self.vout,
            Quantity::Iout => self.iout,
            Quantity::Temperature => self.temperature,
            Quantity::Power => self.power,
        })
    }
}

/// Read one quantity. Power reads VOUT then IOUT and fails if either does.
pub fn read_value<I2C: I2c>(pmbus: &mut Pmbus<I2C>, quantity: Quantity) -> Result<i64> {
    match quantity.source() {
        Some((command, coefficients)) => {
            let raw = pmbus.read_word(command)?;
            Ok(coefficients.decode(raw))
        }
        None => {
            let vout = read_value(pmbus, Quantity::Vout)?;
            let iout = read_value(pmbus, Quantity::Iout)?;
            Ok(vout * iout)
        }
    }
}

/// Read every measured quantity, keeping whatever succeeds.
///
/// A failed register is logged and left out of `valid`; it never stops the
/// remaining reads.
pub fn read_telemetry<I2C: I2c>(pmbus: &mut Pmbus<I2C>) -> Telemetry {
    let mut telemetry = Telemetry::default();
    let mut valid = TelemetryValid::empty();

    for (quantity, field) in [
        (Quantity::Vin, &mut telemetry.vin),
        (Quantity::Vout, &mut telemetry.vout),
        (Quantity::Iout, &mut telemetry.iout),
        (Quantity::Temperature, &mut telemetry.temperature),
    ] {
        match read_value(pmbus, quantity) {
            Ok(value) => {
                *field = value;
                valid |= quantity.valid_flag();
            }
            Err(e) => warn!("Failed to read {}: {}", quantity, e),
        }
    }
    telemetry.valid = valid;

    if telemetry
        .valid
        .contains(TelemetryValid::VOUT | TelemetryValid::IOUT)
    {
        telemetry.power = telemetry.vout * telemetry.iout;
        telemetry.valid |= TelemetryValid::POWER;
    }

    telemetry
}
