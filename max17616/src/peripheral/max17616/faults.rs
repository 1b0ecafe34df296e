//! Human-readable fault descriptions.

use super::status::FaultGroup;

/// Maps a set bit in a group status register to a description.
pub trait FaultDescriber {
    /// `None` for bits with no known meaning.
    fn describe(&self, group: FaultGroup, bit: u8) -> Option<&str>;

    /// Descriptions for every set bit of `value`, lowest bit first.
    fn describe_all(&self, group: FaultGroup, value: u8) -> Vec<(u8, &str)> {
        (0u8..8)
            .filter(|&bit| value & (1 << bit) != 0)
            .filter_map(|bit| self.describe(group, bit).map(|desc| (bit, desc)))
            .collect()
    }
}

/// Built-in MAX17616 fault table.
#[derive(Debug, Clone, Copy, Default)]
pub struct FaultTable;

static FAULTS: &[(FaultGroup, u8, &str)] = &[
    (FaultGroup::Cml, 1, "Communications other error"),
    (FaultGroup::Cml, 4, "Memory error detected"),
    (FaultGroup::Cml, 5, "Packet error checking failed"),
    (FaultGroup::Cml, 6, "Invalid or unsupported data received"),
    (FaultGroup::Cml, 7, "Invalid or unsupported command received"),
    (FaultGroup::Temperature, 7, "Overtemperature fault occurred"),
    (FaultGroup::Input, 4, "Input undervoltage fault occurred"),
    (FaultGroup::Input, 7, "Input overvoltage fault occurred"),
    (FaultGroup::Iout, 6, "Output overcurrent and low voltage fault occurred"),
    (FaultGroup::Iout, 7, "Output overcurrent fault occurred"),
    (FaultGroup::Vout, 5, "Output has gone below the output undervoltage threshold"),
    (FaultGroup::Vout, 6, "Output regulation event has occurred"),
    (FaultGroup::MfrSpecific, 0, "Reverse current fault occurred"),
    (FaultGroup::MfrSpecific, 1, "Output short circuit fault occurred"),
    (FaultGroup::MfrSpecific, 2, "Soft start failed"),
    (FaultGroup::MfrSpecific, 3, "IMON pin fault"),
    (FaultGroup::MfrSpecific, 4, "SETI pin fault"),
];

impl FaultDescriber for FaultTable {
    fn describe(&self, group: FaultGroup, bit: u8) -> Option<&str> {
        FAULTS
            .iter()
            .find(|(g, b, _)| *g == group && *b == bit)
            .map(|(_, _, desc)| *desc)
    }
}
