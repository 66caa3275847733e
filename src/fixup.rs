//! Update-sequence (fixup) verification and repair
//!
//! NTFS overwrites the last two bytes of every 512-byte stride of a record
//! with a shared signature and keeps the displaced bytes in an array in the
//! record header. A stride whose tail no longer carries the signature was
//! torn during a write.

use crate::error::{NtfsError, Result};
use crate::raw::{u16_at, u8_at};

/// Stride covered by one update-sequence entry, independent of sector size
pub const FIXUP_STRIDE: usize = 512;

const USA_OFFSET_FIELD: usize = 0x04;
const USA_COUNT_FIELD: usize = 0x06;

/// Verify and restore every stride covered by the record at the start of
/// `data`. Mutates `data` in place only when every stride verifies.
pub fn apply_fixups(data: &mut [u8]) -> Result<()> {
    let usa_offset = u16_at(data, USA_OFFSET_FIELD)? as usize;
    let usa_count = u16_at(data, USA_COUNT_FIELD)? as usize;

    if usa_count == 0 {
        return Err(NtfsError::corrupt("update sequence array is empty"));
    }
    if usa_offset % 2 != 0 {
        return Err(NtfsError::corrupt(format!("misaligned update sequence at {}", usa_offset)));
    }

    let strides = usa_count - 1;
    if strides * FIXUP_STRIDE > data.len() {
        return Err(NtfsError::corrupt(format!(
            "update sequence covers {} strides, buffer holds {} bytes",
            strides,
            data.len()
        )));
    }

    // Also proves the whole array lies inside the buffer
    let signature = u16_at(data, usa_offset)?;
    u8_at(data, usa_offset + usa_count * 2 - 1)?;

    for i in 0..strides {
        let tail = (i + 1) * FIXUP_STRIDE - 2;
        if u16_at(data, tail)? != signature {
            return Err(NtfsError::corrupt(format!(
                "fixup signature mismatch in stride {} (expected {:#06x})",
                i, signature
            )));
        }
    }

    for i in 0..strides {
        let tail = (i + 1) * FIXUP_STRIDE - 2;
        let saved = usa_offset + (i + 1) * 2;
        data[tail] = data[saved];
        data[tail + 1] = data[saved + 1];
    }

    Ok(())
}
