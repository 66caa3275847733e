//! MFT record reading, validation and attribute lookup

use std::sync::Arc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::attribute::{scan_attributes, AttributeView, ATTR_ATTRIBUTE_LIST, ATTR_END};
use crate::attribute_list::{parse_attribute_list, AttributeListEntry};
use crate::cluster::{Channel, SectorBuffer};
use crate::error::{NtfsError, Result};
use crate::fixup::apply_fixups;
use crate::partition::PartitionInfo;
use crate::raw::{u16_at, u32_at, u64_at};
use crate::reference::{MftReference, RecordLocator};

/// "FILE" read as a little-endian u32
pub const RECORD_MAGIC: u32 = 0x454C_4946;

/// How many attribute-list hops a lookup may take
pub const MAX_LIST_DEPTH: usize = 8;

const FLAG_IN_USE: u16 = 0x01;
const FLAG_DIRECTORY: u16 = 0x02;

/// Fixed part of a FILE record header
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub lsn: u64,
    pub sequence_number: u16,
    pub link_count: u16,
    pub first_attribute_offset: u16,
    pub flags: u16,
    pub bytes_in_use: u32,
    pub bytes_allocated: u32,
    pub base_reference: MftReference,
}

impl RecordHeader {
    fn parse(data: &[u8]) -> Result<Self> {
        Ok(RecordHeader {
            lsn: u64_at(data, 0x08)?,
            sequence_number: u16_at(data, 0x10)?,
            link_count: u16_at(data, 0x12)?,
            first_attribute_offset: u16_at(data, 0x14)?,
            flags: u16_at(data, 0x16)?,
            bytes_in_use: u32_at(data, 0x18)?,
            bytes_allocated: u32_at(data, 0x1C)?,
            base_reference: MftReference(u64_at(data, 0x20)?),
        })
    }

    pub fn is_in_use(&self) -> bool {
        self.flags & FLAG_IN_USE != 0
    }

    pub fn is_directory(&self) -> bool {
        self.flags & FLAG_DIRECTORY != 0
    }

    /// Extension records point back at the record that owns them
    pub fn is_base_record(&self) -> bool {
        self.base_reference.0 == 0
    }
}

/// Check the magic and undo the fixups of a freshly read cluster
fn validate_record(data: &mut [u8]) -> Result<()> {
    let magic = u32_at(data, 0)?;
    if magic != RECORD_MAGIC {
        return Err(NtfsError::corrupt(format!("bad record magic {:#010x}", magic)));
    }
    apply_fixups(data)
}

/// One MFT record held in a cluster buffer
pub struct MftRecord {
    cluster: SectorBuffer,
    locator: Arc<dyn RecordLocator>,
    header: Option<RecordHeader>,
    sector: Option<u64>,
}

impl MftRecord {
    /// Record whose attribute lists are resolved assuming a contiguous MFT
    pub fn new(info: Arc<PartitionInfo>) -> Self {
        let locator: Arc<dyn RecordLocator> = info.clone();
        Self::with_locator(info, locator)
    }

    pub fn with_locator(info: Arc<PartitionInfo>, locator: Arc<dyn RecordLocator>) -> Self {
        let record_size = info.record_size as usize;
        MftRecord {
            cluster: SectorBuffer::spanning(info, record_size),
            locator,
            header: None,
            sector: None,
        }
    }

    /// Read, validate and repair the record at an absolute sector.
    /// On failure nothing stays loaded.
    pub fn read<R: Channel + ?Sized>(&mut self, sector: u64, channel: &mut R) -> Result<()> {
        self.header = None;
        self.sector = None;

        self.cluster.load_checked(sector, channel, validate_record)?;

        match self.cluster.bytes().map(RecordHeader::parse) {
            Some(Ok(header)) => {
                self.header = Some(header);
                self.sector = Some(sector);
                Ok(())
            }
            Some(Err(e)) => {
                self.cluster.release();
                Err(e)
            }
            None => Err(NtfsError::corrupt("record buffer vanished after read")),
        }
    }

    pub fn release(&mut self) {
        self.cluster.release();
        self.header = None;
        self.sector = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.header.is_some()
    }

    pub fn header(&self) -> Option<&RecordHeader> {
        self.header.as_ref()
    }

    /// Sector this record was read from
    pub fn sector(&self) -> Option<u64> {
        self.sector
    }

    /// Fixed-up cluster bytes
    pub fn bytes(&self) -> Option<&[u8]> {
        self.cluster.bytes()
    }

    pub fn partition(&self) -> &Arc<PartitionInfo> {
        self.cluster.partition()
    }

    fn loaded(&self) -> Result<(Arc<[u8]>, usize)> {
        match (self.cluster.shared(), self.header.as_ref()) {
            (Some(mem), Some(header)) => Ok((mem, header.first_attribute_offset as usize)),
            _ => Err(NtfsError::corrupt("no MFT record loaded")),
        }
    }

    /// Find the first attribute of `attr_type`.
    ///
    /// Looks in this record first, then follows a resident attribute list
    /// into other records when a channel is given. `Ok(None)` means the
    /// attribute does not exist anywhere reachable.
    pub fn find_attribute(&self, attr_type: u32, channel: Option<&mut dyn Channel>) -> Result<Option<AttributeView>> {
        let mut visited: Vec<u64> = self.sector.into_iter().collect();
        self.find_attribute_within(attr_type, channel, &mut visited, 0)
    }

    fn find_attribute_within(
        &self,
        attr_type: u32,
        channel: Option<&mut dyn Channel>,
        visited: &mut Vec<u64>,
        depth: usize,
    ) -> Result<Option<AttributeView>> {
        let (mem, first) = self.loaded()?;

        if let Some(at) = scan_attributes(&mem, first, attr_type, false)? {
            return AttributeView::new(mem, at).map(Some);
        }

        let Some(channel) = channel else {
            return Ok(None);
        };

        let Some(entries) = self.attribute_list()? else {
            return Ok(None);
        };

        if depth >= MAX_LIST_DEPTH {
            warn!("Attribute list chain deeper than {} records, giving up on {:#x}", MAX_LIST_DEPTH, attr_type);
            return Ok(None);
        }

        for entry in entries.iter().filter(|e| e.attr_type == attr_type) {
            let Some(sector) = self.locator.sector_for_reference(entry.reference) else {
                warn!("Attribute list points at unmappable record {}", entry.reference);
                continue;
            };
            if visited.contains(&sector) {
                continue;
            }
            visited.push(sector);

            let mut other = MftRecord::with_locator(Arc::clone(self.partition()), Arc::clone(&self.locator));
            if let Err(e) = other.read(sector, &mut *channel) {
                warn!("Skipping record {} at sector {}: {}", entry.reference, sector, e);
                continue;
            }

            match other.find_attribute_within(attr_type, Some(&mut *channel), visited, depth + 1) {
                Ok(Some(found)) => return Ok(Some(found)),
                Ok(None) => {}
                Err(e) => warn!("Record {} unusable while resolving {:#x}: {}", entry.reference, attr_type, e),
            }
        }

        Ok(None)
    }

    /// Every attribute header stored directly in this record, in order
    pub fn attributes(&self) -> Result<Vec<AttributeView>> {
        let (mem, mut pos) = self.loaded()?;
        let mut views = Vec::new();

        while pos + 8 <= mem.len() && u32_at(&mem, pos)? != ATTR_END {
            let view = AttributeView::new(Arc::clone(&mem), pos)?;
            pos += view.length();
            views.push(view);
        }

        Ok(views)
    }

    /// Entries of this record's resident $ATTRIBUTE_LIST, if it has one.
    /// Non-resident lists are not supported and read as absent.
    pub fn attribute_list(&self) -> Result<Option<Vec<AttributeListEntry>>> {
        let (mem, first) = self.loaded()?;

        let Some(at) = scan_attributes(&mem, first, ATTR_ATTRIBUTE_LIST, false)? else {
            return Ok(None);
        };
        let list = AttributeView::new(mem, at)?;
        if !list.is_resident() {
            debug!("Non-resident attribute list at offset {} ignored", at);
            return Ok(None);
        }

        parse_attribute_list(list.resident_data()).map(Some)
    }
}
