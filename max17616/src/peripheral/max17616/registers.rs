//! Typed configuration registers.
//!
//! Each setting lives in one byte register. Writes store the encoded value
//! as the whole byte; reads mask the documented field and map it back, so a
//! pattern outside the field's table is reported rather than guessed.

use strum::{Display, EnumIter, FromRepr};

use crate::peripheral::pmbus::commands;

/// A setting stored in a single byte register.
pub trait RegisterField: Sized + Copy {
    const COMMAND: u8;
    /// Register name used in errors and logs
    const NAME: &'static str;

    fn to_raw(self) -> u8;

    /// `None` when the masked bits match no setting.
    fn from_raw(raw: u8) -> Option<Self>;
}

/// Behaviour after the current limit trips (SET_CLMODE bits 7:6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, EnumIter, Display)]
#[repr(u8)]
pub enum CurrentLimitMode {
    #[strum(to_string = "Latch-off")]
    LatchOff = 0x00,
    #[strum(to_string = "Continuous")]
    Continuous = 0x40,
    #[strum(to_string = "Auto-retry")]
    AutoRetry = 0x80,
}

impl RegisterField for CurrentLimitMode {
    const COMMAND: u8 = commands::SET_CLMODE;
    const NAME: &'static str = "SET_CLMODE";

    fn to_raw(self) -> u8 {
        self as u8
    }

    fn from_raw(raw: u8) -> Option<Self> {
        Self::from_repr(raw & 0xC0)
    }
}

/// Startup current as a fraction of the current limit (SET_ISTART_RATIO bits 3:0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, EnumIter, Display)]
#[repr(u8)]
pub enum IstartRatio {
    #[strum(to_string = "Full (I_limit)")]
    Full = 0,
    #[strum(to_string = "Half (I_limit/2)")]
    Half = 1,
    #[strum(to_string = "Quarter (I_limit/4)")]
    Quarter = 2,
    #[strum(to_string = "Eighth (I_limit/8)")]
    Eighth = 3,
    #[strum(to_string = "Sixteenth (I_limit/16)")]
    Sixteenth = 4,
}

impl RegisterField for IstartRatio {
    const COMMAND: u8 = commands::SET_ISTART_RATIO;
    const NAME: &'static str = "SET_ISTART_RATIO";

    fn to_raw(self) -> u8 {
        self as u8
    }

    fn from_raw(raw: u8) -> Option<Self> {
        Self::from_repr(raw & 0x0F)
    }
}

/// Short-term overcurrent timeout (SET_TSTOC bits 1:0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, EnumIter, Display)]
#[repr(u8)]
pub enum OvercurrentTimeout {
    #[strum(to_string = "400 microseconds")]
    Us400 = 0,
    #[strum(to_string = "1 millisecond")]
    Ms1 = 1,
    #[strum(to_string = "4 milliseconds")]
    Ms4 = 2,
    #[strum(to_string = "24 milliseconds")]
    Ms24 = 3,
}

impl RegisterField for OvercurrentTimeout {
    const COMMAND: u8 = commands::SET_TSTOC;
    const NAME: &'static str = "SET_TSTOC";

    fn to_raw(self) -> u8 {
        self as u8
    }

    fn from_raw(raw: u8) -> Option<Self> {
        Self::from_repr(raw & 0x03)
    }
}

/// Short-term overcurrent limit relative to the set limit (SET_ISTLIM bits 1:0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, EnumIter, Display)]
#[repr(u8)]
pub enum OvercurrentLimit {
    #[strum(to_string = "1.25:1 ratio")]
    Ratio1_25 = 0,
    #[strum(to_string = "1.50:1 ratio")]
    Ratio1_50 = 1,
    #[strum(to_string = "1.75:1 ratio")]
    Ratio1_75 = 2,
    #[strum(to_string = "2.00:1 ratio")]
    Ratio2_00 = 3,
}

impl RegisterField for OvercurrentLimit {
    const COMMAND: u8 = commands::SET_ISTLIM;
    const NAME: &'static str = "SET_ISTLIM";

    fn to_raw(self) -> u8 {
        self as u8
    }

    fn from_raw(raw: u8) -> Option<Self> {
        Self::from_repr(raw & 0x03)
    }
}

/// Nominal output voltage used to derive the UV threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, EnumIter, Display)]
#[repr(u8)]
pub enum NominalVoltage {
    #[strum(to_string = "5V")]
    V5 = 0,
    #[strum(to_string = "9V")]
    V9 = 1,
    #[strum(to_string = "12V")]
    V12 = 2,
    #[strum(to_string = "24V")]
    V24 = 3,
    #[strum(to_string = "36V")]
    V36 = 4,
    #[strum(to_string = "48V")]
    V48 = 5,
    #[strum(to_string = "60V")]
    V60 = 6,
    #[strum(to_string = "72V")]
    V72 = 7,
}

/// PGOOD threshold below nominal
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, EnumIter, Display)]
#[repr(u8)]
pub enum PgoodThreshold {
    #[strum(to_string = "-10%")]
    Minus10 = 0,
    #[strum(to_string = "-20%")]
    Minus20 = 1,
    #[strum(to_string = "-30%")]
    Minus30 = 2,
}

/// VOUT_UV_FAULT_LIMIT: nominal voltage in bits 4:2, PGOOD threshold in 1:0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoutUvFaultConfig {
    pub nominal: NominalVoltage,
    pub threshold: PgoodThreshold,
}

impl RegisterField for VoutUvFaultConfig {
    const COMMAND: u8 = commands::VOUT_UV_FAULT_LIMIT;
    const NAME: &'static str = "VOUT_UV_FAULT_LIMIT";

    fn to_raw(self) -> u8 {
        ((self.nominal as u8) << 2) | self.threshold as u8
    }

    fn from_raw(raw: u8) -> Option<Self> {
        Some(Self {
            nominal: NominalVoltage::from_repr((raw >> 2) & 0x07)?,
            threshold: PgoodThreshold::from_repr(raw & 0x03)?,
        })
    }
}

impl std::fmt::Display for VoutUvFaultConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} nominal, {} PGOOD threshold",
            self.nominal, self.threshold
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;
    use test_case::test_case;

    fn roundtrip<F: RegisterField + PartialEq + std::fmt::Debug>(field: F) {
        assert_eq!(F::from_raw(field.to_raw()), Some(field));
    }

    #[test]
    fn test_every_setting_survives_encoding() {
        CurrentLimitMode::iter().for_each(roundtrip);
        IstartRatio::iter().for_each(roundtrip);
        OvercurrentTimeout::iter().for_each(roundtrip);
        OvercurrentLimit::iter().for_each(roundtrip);
        for nominal in NominalVoltage::iter() {
            for threshold in PgoodThreshold::iter() {
                roundtrip(VoutUvFaultConfig { nominal, threshold });
            }
        }
    }

    #[test_case(0x3F, Some(CurrentLimitMode::LatchOff); "low bits ignored")]
    #[test_case(0x41, Some(CurrentLimitMode::Continuous); "continuous")]
    #[test_case(0xC0, None; "undefined pattern")]
    fn test_clmode_masking(raw: u8, expected: Option<CurrentLimitMode>) {
        assert_eq!(CurrentLimitMode::from_raw(raw), expected);
    }

    #[test]
    fn test_istart_ratio_rejects_unknown() {
        assert_eq!(IstartRatio::from_raw(0xF4), Some(IstartRatio::Sixteenth));
        assert_eq!(IstartRatio::from_raw(0x05), None);
    }

    #[test]
    fn test_uv_fault_encoding() {
        let config = VoutUvFaultConfig {
            nominal: NominalVoltage::V48,
            threshold: PgoodThreshold::Minus30,
        };
        assert_eq!(config.to_raw(), 0x16);
        assert_eq!(config.to_string(), "48V nominal, -30% PGOOD threshold");

        // PGOOD field value 3 is reserved
        assert_eq!(VoutUvFaultConfig::from_raw(0x17), None);
    }

    #[test]
    fn test_labels() {
        assert_eq!(CurrentLimitMode::AutoRetry.to_string(), "Auto-retry");
        assert_eq!(OvercurrentTimeout::Us400.to_string(), "400 microseconds");
        assert_eq!(OvercurrentLimit::Ratio2_00.to_string(), "2.00:1 ratio");
    }
}
