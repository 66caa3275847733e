//! Physical layout of the MFT, built from its own $DATA runs
//! Maps an MFT record index to the absolute sector holding it

use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::attribute::ATTR_DATA;
use crate::cluster::Channel;
use crate::error::{NtfsError, Result};
use crate::partition::PartitionInfo;
use crate::record::MftRecord;
use crate::reference::{MftReference, RecordLocator};

const BLOCK_GROWTH: usize = 16;

/// A contiguous stretch of MFT records on disk
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MftBlock {
    pub first_sector: u64,
    /// Number of MFT records the block holds
    pub record_count: u64,
}

/// Blocks in logical MFT order, exactly as the data runs list them
pub struct MftMap {
    info: Arc<PartitionInfo>,
    blocks: Vec<MftBlock>,
}

impl MftMap {
    pub fn new(info: Arc<PartitionInfo>) -> Self {
        MftMap { info, blocks: Vec::new() }
    }

    /// Build the block list from the $DATA attribute of the MFT's own record
    /// (record 0). Any previously loaded blocks are discarded; on failure the
    /// map is left empty.
    pub fn load(&mut self, record: &MftRecord, channel: Option<&mut dyn Channel>) -> Result<()> {
        info!("[Processing MFT] from sector {:?}", record.sector());

        self.blocks = Vec::new();
        self.blocks = self.build_blocks(record, channel)?;

        info!(
            "MFT map: {} blocks, {} record slots",
            self.blocks.len(),
            self.total_length()
        );
        Ok(())
    }

    fn build_blocks(&self, record: &MftRecord, channel: Option<&mut dyn Channel>) -> Result<Vec<MftBlock>> {
        let data = record
            .find_attribute(ATTR_DATA, channel)?
            .ok_or_else(|| NtfsError::corrupt("MFT record has no $DATA attribute"))?;
        if data.is_resident() {
            return Err(NtfsError::corrupt("MFT $DATA attribute is resident"));
        }

        let cluster_size = self.info.cluster_size() as u64;
        let record_size = self.info.record_size as u64;
        if record_size == 0 {
            return Err(NtfsError::corrupt("MFT record size is zero"));
        }

        let mut blocks = Vec::new();
        let mut runs = data.data_run_decoder();
        let mut run = runs.first_run()?;
        while let Some(r) = run {
            if r.sparse {
                return Err(NtfsError::corrupt(format!(
                    "sparse run of {} clusters inside the MFT",
                    r.cluster_count
                )));
            }

            let record_count = r.cluster_count.saturating_mul(cluster_size) / record_size;
            let first_sector = r
                .first_cluster
                .checked_mul(self.info.sectors_per_cluster as u64)
                .and_then(|s| s.checked_add(self.info.first_sector));

            match first_sector {
                _ if record_count == 0 => {
                    debug!("MFT run of {} clusters holds no whole record", r.cluster_count);
                }
                Some(first_sector) if first_sector < self.info.last_sector => {
                    push_block(&mut blocks, MftBlock { first_sector, record_count })?;
                }
                _ => {
                    warn!("MFT run at cluster {} lies beyond the volume, skipped", r.first_cluster);
                }
            }

            run = runs.next_run()?;
        }

        Ok(blocks)
    }

    /// Total number of record slots across all blocks
    pub fn total_length(&self) -> u64 {
        self.blocks.iter().map(|b| b.record_count).sum()
    }

    pub fn blocks(&self) -> &[MftBlock] {
        &self.blocks
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Absolute sector of MFT record `index`, or `None` when the index is
    /// past the map or lands beyond the volume.
    pub fn sector_for_index(&self, mut index: u64) -> Option<u64> {
        for block in &self.blocks {
            if index >= block.record_count {
                index -= block.record_count;
                continue;
            }

            let sector = index
                .checked_mul(self.info.sectors_per_record())?
                .checked_add(block.first_sector)?;
            return (sector <= self.info.last_sector).then_some(sector);
        }

        None
    }
}

fn push_block(blocks: &mut Vec<MftBlock>, block: MftBlock) -> Result<()> {
    if blocks.len() == blocks.capacity() {
        blocks
            .try_reserve_exact(BLOCK_GROWTH)
            .map_err(|_| NtfsError::OutOfMemory)?;
    }
    blocks.push(block);
    Ok(())
}

impl RecordLocator for MftMap {
    fn sector_for_reference(&self, reference: MftReference) -> Option<u64> {
        self.sector_for_index(reference.record_number())
    }
}
