//! MFT file references and their translation to absolute sectors

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::partition::PartitionInfo;

const RECORD_NUMBER_MASK: u64 = 0x0000_FFFF_FFFF_FFFF;

/// 64-bit file reference: 48-bit record number plus 16-bit sequence number
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MftReference(pub u64);

impl MftReference {
    pub fn new(record_number: u64, sequence: u16) -> Self {
        MftReference((record_number & RECORD_NUMBER_MASK) | ((sequence as u64) << 48))
    }

    pub fn record_number(self) -> u64 {
        self.0 & RECORD_NUMBER_MASK
    }

    pub fn sequence(self) -> u16 {
        (self.0 >> 48) as u16
    }
}

impl fmt::Display for MftReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.record_number(), self.sequence())
    }
}

/// Translates a file reference into the absolute sector holding its record.
/// `None` means the reference cannot be placed on this volume.
pub trait RecordLocator {
    fn sector_for_reference(&self, reference: MftReference) -> Option<u64>;
}

/// Assumes an unfragmented MFT starting at `mft_start_sector`
impl RecordLocator for PartitionInfo {
    fn sector_for_reference(&self, reference: MftReference) -> Option<u64> {
        let sector = reference
            .record_number()
            .checked_mul(self.sectors_per_record())?
            .checked_add(self.mft_start_sector)?;
        (sector <= self.last_sector).then_some(sector)
    }
}

impl<F> RecordLocator for F
where
    F: Fn(MftReference) -> Option<u64>,
{
    fn sector_for_reference(&self, reference: MftReference) -> Option<u64> {
        self(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_fields() {
        let reference = MftReference(0x0005_0000_0000_001B);
        assert_eq!(reference.record_number(), 27);
        assert_eq!(reference.sequence(), 5);
        assert_eq!(MftReference::new(27, 5), reference);
        assert_eq!(reference.to_string(), "27#5");
    }

    #[test]
    fn test_contiguous_locator() {
        let info = PartitionInfo::new(512, 8, 0, 10_000, 6_000);
        assert_eq!(info.sector_for_reference(MftReference::new(3, 1)), Some(6_006));
        assert_eq!(info.sector_for_reference(MftReference::new(5_000, 1)), None);
    }

    #[test]
    fn test_closure_locator() {
        let locator = |r: MftReference| Some(r.record_number() * 100);
        assert_eq!(locator.sector_for_reference(MftReference::new(2, 0)), Some(200));
    }
}
