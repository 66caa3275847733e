//! Attribute header views over a shared record buffer

use std::sync::Arc;

use crate::data_run::DataRunDecoder;
use crate::error::{NtfsError, Result};
use crate::raw::{u16_at, u32_at, u64_at, u8_at};

// Attribute Types
pub const ATTR_STANDARD_INFORMATION: u32 = 0x10;
pub const ATTR_ATTRIBUTE_LIST: u32 = 0x20;
pub const ATTR_FILE_NAME: u32 = 0x30;
pub const ATTR_DATA: u32 = 0x80;
pub const ATTR_END: u32 = 0xFFFF_FFFF;

const COMMON_HEADER_LEN: usize = 0x10;
const RESIDENT_HEADER_LEN: usize = 0x18;
const NON_RESIDENT_HEADER_LEN: usize = 0x40;

/// Walk the attribute chain starting at `pos` and return the offset of the
/// first header of `attr_type`. With `skip_first` the header at `pos` itself
/// is stepped over. The walk never leaves `mem`.
pub(crate) fn scan_attributes(mem: &[u8], mut pos: usize, attr_type: u32, skip_first: bool) -> Result<Option<usize>> {
    let mut skip = skip_first;

    while pos + 8 <= mem.len() {
        let found = u32_at(mem, pos)?;
        if found == ATTR_END {
            break;
        }

        let length = u32_at(mem, pos + 4)? as usize;
        if length == 0 || pos + length > mem.len() {
            return Err(NtfsError::corrupt(format!(
                "attribute {:#x} at offset {} declares {} bytes in a {}-byte buffer",
                found,
                pos,
                length,
                mem.len()
            )));
        }

        if !skip && found == attr_type {
            return Ok(Some(pos));
        }
        skip = false;
        pos += length;
    }

    Ok(None)
}

/// Read-only window onto one attribute header and its inline data.
///
/// Holds its own reference to the buffer, so it stays valid after the
/// record it came from is dropped.
#[derive(Clone)]
pub struct AttributeView {
    mem: Arc<[u8]>,
    offset: usize,
    length: usize,
}

impl std::fmt::Debug for AttributeView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeView")
            .field("offset", &self.offset)
            .field("type", &format_args!("{:#x}", self.attr_type()))
            .field("resident", &self.is_resident())
            .field("length", &self.length())
            .finish()
    }
}

impl AttributeView {
    /// Validate the header at `offset` and wrap it
    pub(crate) fn new(mem: Arc<[u8]>, offset: usize) -> Result<Self> {
        let length = validate_header(&mem, offset)?;
        Ok(AttributeView { mem, offset, length })
    }

    fn header(&self) -> &[u8] {
        &self.mem[self.offset..self.offset + self.length]
    }

    // Fields below were validated in `new`, so the header slice is in bounds
    fn field_u8(&self, at: usize) -> u8 {
        self.header()[at]
    }

    fn field_u16(&self, at: usize) -> u16 {
        u16::from_le_bytes([self.header()[at], self.header()[at + 1]])
    }

    fn field_u32(&self, at: usize) -> u32 {
        let h = self.header();
        u32::from_le_bytes([h[at], h[at + 1], h[at + 2], h[at + 3]])
    }

    fn field_u64(&self, at: usize) -> u64 {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.header()[at..at + 8]);
        u64::from_le_bytes(raw)
    }

    /// Offset of this header inside the record buffer
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn attr_type(&self) -> u32 {
        self.field_u32(0x00)
    }

    /// Declared size of the whole attribute, header included
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn is_resident(&self) -> bool {
        self.field_u8(0x08) == 0
    }

    /// Name length in UTF-16 units; 0 for the unnamed stream
    pub fn name_length(&self) -> u8 {
        self.field_u8(0x09)
    }

    pub fn flags(&self) -> u16 {
        self.field_u16(0x0C)
    }

    pub fn attribute_id(&self) -> u16 {
        self.field_u16(0x0E)
    }

    /// Inline value bytes, borrowed from the record buffer
    ///
    /// # Panics
    /// If the attribute is non-resident.
    pub fn resident_data(&self) -> &[u8] {
        assert!(self.is_resident(), "resident_data() on a non-resident attribute");
        let start = self.field_u16(0x14) as usize;
        &self.header()[start..start + self.resident_size()]
    }

    /// # Panics
    /// If the attribute is non-resident.
    pub fn resident_size(&self) -> usize {
        assert!(self.is_resident(), "resident_size() on a non-resident attribute");
        self.field_u32(0x10) as usize
    }

    /// Decoder over this attribute's run list
    ///
    /// # Panics
    /// If the attribute is resident.
    pub fn data_run_decoder(&self) -> DataRunDecoder {
        assert!(!self.is_resident(), "data_run_decoder() on a resident attribute");
        let runs = self.offset + self.field_u16(0x20) as usize;
        DataRunDecoder::new(Arc::clone(&self.mem), runs, self.offset + self.length())
    }

    pub fn start_vcn(&self) -> Option<u64> {
        (!self.is_resident()).then(|| self.field_u64(0x10))
    }

    pub fn last_vcn(&self) -> Option<u64> {
        (!self.is_resident()).then(|| self.field_u64(0x18))
    }

    pub fn allocated_size(&self) -> Option<u64> {
        (!self.is_resident()).then(|| self.field_u64(0x28))
    }

    pub fn real_size(&self) -> Option<u64> {
        (!self.is_resident()).then(|| self.field_u64(0x30))
    }

    pub fn initialized_size(&self) -> Option<u64> {
        (!self.is_resident()).then(|| self.field_u64(0x38))
    }

    /// Move to the next header of `attr_type` later in the same buffer.
    /// Returns `false` (and stays put) when there is none.
    pub fn advance_to_next_same_type(&mut self, attr_type: u32) -> Result<bool> {
        match scan_attributes(&self.mem, self.offset, attr_type, true)? {
            Some(next) => {
                self.length = validate_header(&self.mem, next)?;
                self.offset = next;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Shared handle on the underlying buffer
    pub fn buffer(&self) -> &Arc<[u8]> {
        &self.mem
    }
}

/// Check the header at `offset` against the buffer and return its declared length
fn validate_header(mem: &[u8], offset: usize) -> Result<usize> {
    let length = u32_at(mem, offset + 4)? as usize;
    let end = offset
        .checked_add(length)
        .filter(|&end| end <= mem.len())
        .ok_or_else(|| NtfsError::corrupt(format!("attribute at {} runs past the record buffer", offset)))?;

    if length < COMMON_HEADER_LEN {
        return Err(NtfsError::corrupt(format!("attribute at {} is only {} bytes", offset, length)));
    }
    let header = &mem[offset..end];

    if u8_at(header, 0x08)? == 0 {
        if length < RESIDENT_HEADER_LEN {
            return Err(NtfsError::corrupt(format!("resident attribute at {} truncated", offset)));
        }
        let value_len = u32_at(header, 0x10)? as usize;
        let value_off = u16_at(header, 0x14)? as usize;
        if value_off + value_len > length {
            return Err(NtfsError::corrupt(format!(
                "resident value ({} bytes at +{}) overruns attribute at {}",
                value_len, value_off, offset
            )));
        }
    } else {
        if length < NON_RESIDENT_HEADER_LEN {
            return Err(NtfsError::corrupt(format!("non-resident attribute at {} truncated", offset)));
        }
        let runs_off = u16_at(header, 0x20)? as usize;
        if runs_off >= length {
            return Err(NtfsError::corrupt(format!("run list offset {} outside attribute at {}", runs_off, offset)));
        }
        u64_at(header, 0x38)?;
    }

    Ok(length)
}
