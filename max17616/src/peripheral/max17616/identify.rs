//! Chip identification.
//!
//! A part is accepted only when the manufacturer ID, the IC device ID and
//! the PMBus revision all match. The device ID block decides the variant.

use strum::Display;

use crate::error::{Error, Mismatch, Result};
use crate::hw_trait::I2c;
use crate::peripheral::pmbus::{commands, Pmbus};
use crate::tracing::prelude::*;

/// Room for an ID block reply. Parts may pad their IDs, so this is larger
/// than any ID in [`CHIP_INFO`].
const ID_BLOCK_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ChipVariant {
    #[strum(to_string = "MAX17616")]
    Max17616,
    #[strum(to_string = "MAX17616A")]
    Max17616A,
}

/// Fixed identification data for the family.
#[derive(Debug)]
pub struct ChipInfo {
    pub mfr_id: &'static str,
    pub mfr_revision: &'static str,
    /// Part I and Part II revision 1.3
    pub pmbus_revision: u16,
    /// Device ID strings, matched in this order
    pub variants: &'static [(ChipVariant, &'static str)],
}

pub static CHIP_INFO: ChipInfo = ChipInfo {
    mfr_id: "MAXIM",
    mfr_revision: "01",
    pmbus_revision: 0x33,
    variants: &[
        (ChipVariant::Max17616, "MAX17616"),
        (ChipVariant::Max17616A, "MAX17616A"),
    ],
};

impl ChipInfo {
    /// Variant whose device ID equals `payload`, ignoring NUL or space padding.
    pub fn match_device_id(&self, payload: &[u8]) -> Option<ChipVariant> {
        let end = payload
            .iter()
            .rposition(|&b| b != 0 && b != b' ')
            .map_or(0, |i| i + 1);
        let trimmed = &payload[..end];

        // Exact match, not prefix: "MAX17616" must not claim a MAX17616A,
        // and unknown suffixes such as MAX17616B are rejected.
        self.variants
            .iter()
            .find(|(_, id)| id.as_bytes() == trimmed)
            .map(|(variant, _)| *variant)
    }
}

/// Run the identification sequence against `info`.
pub fn identify<I2C: I2c>(pmbus: &mut Pmbus<I2C>, info: &ChipInfo) -> Result<ChipVariant> {
    let mut mfr_id = [0u8; ID_BLOCK_CAPACITY];
    let len = pmbus.read_block(commands::MFR_ID, &mut mfr_id)?;
    if &mfr_id[..len] != info.mfr_id.as_bytes() {
        debug!(
            "MFR_ID mismatch: {:?}",
            String::from_utf8_lossy(&mfr_id[..len])
        );
        return Err(Error::NotDetected(Mismatch::ManufacturerId));
    }

    let mut device_id = [0u8; ID_BLOCK_CAPACITY];
    let len = pmbus.read_block(commands::IC_DEVICE_ID, &mut device_id)?;
    let variant = info.match_device_id(&device_id[..len]).ok_or_else(|| {
        debug!(
            "IC_DEVICE_ID not recognised: {:?}",
            String::from_utf8_lossy(&device_id[..len])
        );
        Error::NotDetected(Mismatch::DeviceId)
    })?;

    let revision = pmbus.read_word(commands::PMBUS_REVISION)?;
    if revision != info.pmbus_revision {
        debug!("PMBUS_REVISION 0x{:04X} unsupported", revision);
        return Err(Error::NotDetected(Mismatch::PmbusRevision));
    }

    debug!("Identified {}", variant);
    Ok(variant)
}
