//! Volume geometry shared by every reader in the core

use serde::{Deserialize, Serialize};

/// Default MFT record length when the boot sector does not say otherwise
pub const DEFAULT_RECORD_SIZE: u32 = 1024;

/// Geometry of one NTFS volume. Built once per session (usually from the
/// boot sector) and shared read-only behind an `Arc`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PartitionInfo {
    pub sector_size: u32,
    pub sectors_per_cluster: u32,
    /// Absolute sector where the volume starts
    pub first_sector: u64,
    /// Last usable absolute sector (inclusive)
    pub last_sector: u64,
    /// Absolute sector of MFT record 0
    pub mft_start_sector: u64,
    pub record_size: u32,
}

impl PartitionInfo {
    pub fn new(
        sector_size: u32,
        sectors_per_cluster: u32,
        first_sector: u64,
        last_sector: u64,
        mft_start_sector: u64,
    ) -> Self {
        PartitionInfo {
            sector_size,
            sectors_per_cluster,
            first_sector,
            last_sector,
            mft_start_sector,
            record_size: DEFAULT_RECORD_SIZE,
        }
    }

    pub fn with_record_size(mut self, record_size: u32) -> Self {
        self.record_size = record_size;
        self
    }

    /// Cluster size in bytes
    pub fn cluster_size(&self) -> usize {
        self.sectors_per_cluster as usize * self.sector_size as usize
    }

    pub fn sectors_per_record(&self) -> u64 {
        (self.record_size / self.sector_size.max(1)) as u64
    }

    /// Byte offset of an absolute sector on the device
    pub fn sector_to_bytes(&self, sector: u64) -> u64 {
        sector * self.sector_size as u64
    }

    pub fn contains_sector(&self, sector: u64) -> bool {
        sector >= self.first_sector && sector <= self.last_sector
    }
}
