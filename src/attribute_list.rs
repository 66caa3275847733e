//! $ATTRIBUTE_LIST entries: where a file's attributes live when they no
//! longer fit in its base record

use serde::{Deserialize, Serialize};

use crate::error::{NtfsError, Result};
use crate::raw::{u16_at, u32_at, u64_at, u8_at};
use crate::reference::MftReference;

const ENTRY_MIN_LEN: usize = 0x1A;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AttributeListEntry {
    pub attr_type: u32,
    pub record_length: u16,
    pub name_length: u8,
    pub start_vcn: u64,
    /// Record holding the attribute
    pub reference: MftReference,
    pub attribute_id: u16,
}

/// Decode the resident value of an attribute list
pub fn parse_attribute_list(data: &[u8]) -> Result<Vec<AttributeListEntry>> {
    let mut entries = Vec::new();
    let mut offset = 0;

    while offset + ENTRY_MIN_LEN <= data.len() {
        let record_length = u16_at(data, offset + 0x04)?;
        if (record_length as usize) < ENTRY_MIN_LEN || offset + record_length as usize > data.len() {
            return Err(NtfsError::corrupt(format!(
                "attribute list entry at {} has length {}",
                offset, record_length
            )));
        }

        entries.push(AttributeListEntry {
            attr_type: u32_at(data, offset)?,
            record_length,
            name_length: u8_at(data, offset + 0x06)?,
            start_vcn: u64_at(data, offset + 0x08)?,
            reference: MftReference(u64_at(data, offset + 0x10)?),
            attribute_id: u16_at(data, offset + 0x18)?,
        });

        offset += record_length as usize;
    }

    Ok(entries)
}
