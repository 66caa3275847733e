//! Bounds-checked little-endian field access over on-disk buffers

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{NtfsError, Result};

fn field(data: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    offset
        .checked_add(len)
        .and_then(|end| data.get(offset..end))
        .ok_or_else(|| {
            NtfsError::corrupt(format!(
                "field at offset {} (+{}) past end of {}-byte buffer",
                offset,
                len,
                data.len()
            ))
        })
}

pub(crate) fn u8_at(data: &[u8], offset: usize) -> Result<u8> {
    Ok(field(data, offset, 1)?[0])
}

pub(crate) fn u16_at(data: &[u8], offset: usize) -> Result<u16> {
    Ok(LittleEndian::read_u16(field(data, offset, 2)?))
}

pub(crate) fn u32_at(data: &[u8], offset: usize) -> Result<u32> {
    Ok(LittleEndian::read_u32(field(data, offset, 4)?))
}

pub(crate) fn u64_at(data: &[u8], offset: usize) -> Result<u64> {
    Ok(LittleEndian::read_u64(field(data, offset, 8)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_in_bounds() {
        let data = [0x46, 0x49, 0x4C, 0x45, 0x30, 0x00, 0x03, 0x00, 0xAA];
        assert_eq!(u32_at(&data, 0).unwrap(), 0x454C4946);
        assert_eq!(u16_at(&data, 4).unwrap(), 0x30);
        assert_eq!(u8_at(&data, 8).unwrap(), 0xAA);
    }

    #[test]
    fn test_rejects_out_of_bounds() {
        let data = [0u8; 8];
        assert!(u64_at(&data, 1).unwrap_err().is_corruption());
        assert!(u16_at(&data, usize::MAX).is_err());
        assert!(u8_at(&data, 7).is_ok());
    }
}
