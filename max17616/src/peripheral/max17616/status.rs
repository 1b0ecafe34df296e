//! Status word and per-group fault registers.

use strum::{Display, EnumIter, IntoEnumIterator};

use crate::error::Result;
use crate::hw_trait::I2c;
use crate::peripheral::pmbus::{commands, Pmbus, StatusWord};
use crate::tracing::prelude::*;

/// A status register summarised by one STATUS_WORD bit.
///
/// Iteration order is the order [`read_status`] visits the groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display)]
pub enum FaultGroup {
    #[strum(to_string = "CML")]
    Cml,
    #[strum(to_string = "Temperature")]
    Temperature,
    #[strum(to_string = "Input")]
    Input,
    #[strum(to_string = "Output Current")]
    Iout,
    #[strum(to_string = "Output Voltage")]
    Vout,
    #[strum(to_string = "Manufacturer")]
    MfrSpecific,
}

impl FaultGroup {
    /// STATUS_WORD bit that says this group has something to report
    pub fn summary_bit(self) -> StatusWord {
        match self {
            FaultGroup::Cml => StatusWord::CML,
            FaultGroup::Temperature => StatusWord::TEMP,
            FaultGroup::Input => StatusWord::INPUT,
            FaultGroup::Iout => StatusWord::IOUT,
            FaultGroup::Vout => StatusWord::VOUT,
            FaultGroup::MfrSpecific => StatusWord::MFR,
        }
    }

    pub fn command(self) -> u8 {
        match self {
            FaultGroup::Cml => commands::STATUS_CML,
            FaultGroup::Temperature => commands::STATUS_TEMPERATURE,
            FaultGroup::Input => commands::STATUS_INPUT,
            FaultGroup::Iout => commands::STATUS_IOUT,
            FaultGroup::Vout => commands::STATUS_VOUT,
            FaultGroup::MfrSpecific => commands::STATUS_MFR_SPECIFIC,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Snapshot of STATUS_WORD and the group registers it pointed at.
///
/// A group byte is only read when its summary bit is set; otherwise it
/// stays zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Status {
    pub word: StatusWord,
    groups: [u8; 6],
}

impl Status {
    /// STATUS_BYTE equivalent (low byte of the word)
    pub fn byte(&self) -> u8 {
        (self.word.bits() & 0xFF) as u8
    }

    /// Group register contents, or `None` when the word did not flag it.
    pub fn group(&self, group: FaultGroup) -> Option<u8> {
        self.word
            .contains(group.summary_bit())
            .then(|| self.groups[group.index()])
    }

    /// Flagged groups with a nonzero register, in read order.
    pub fn active_groups(&self) -> impl Iterator<Item = (FaultGroup, u8)> + '_ {
        FaultGroup::iter()
            .filter_map(|g| self.group(g).map(|value| (g, value)))
            .filter(|(_, value)| *value != 0)
    }

    pub fn is_clear(&self) -> bool {
        self.word.is_empty()
    }
}

/// Read STATUS_WORD, then each group register whose summary bit is set.
///
/// Any failed read aborts; no partial snapshot is returned.
pub fn read_status<I2C: I2c>(pmbus: &mut Pmbus<I2C>) -> Result<Status> {
    let word = StatusWord::from_bits_retain(pmbus.read_word(commands::STATUS_WORD)?);
    let mut status = Status {
        word,
        ..Default::default()
    };

    for group in FaultGroup::iter() {
        if word.contains(group.summary_bit()) {
            status.groups[group.index()] = pmbus.read_byte(group.command())?;
        }
    }

    if !status.is_clear() {
        debug!("STATUS_WORD 0x{:04X} ({:?})", word.bits(), word);
    }
    Ok(status)
}
