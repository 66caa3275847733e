//! NTFS boot sector parsing
//! Produces the `PartitionInfo` the rest of the core works from

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Seek, SeekFrom};

use crate::error::{NtfsError, Result};
use crate::partition::PartitionInfo;

const OEM_ID: &[u8] = b"NTFS    ";
const BOOT_SIGNATURE: u16 = 0xAA55;

/// Parse an NTFS boot sector found at absolute sector `first_sector`
pub fn parse_boot_sector(data: &[u8], first_sector: u64) -> Result<PartitionInfo> {
    if data.len() < 512 {
        return Err(NtfsError::corrupt(format!("boot sector is only {} bytes", data.len())));
    }

    // Check for NTFS signature
    if &data[3..11] != OEM_ID {
        return Err(NtfsError::corrupt("missing NTFS OEM id"));
    }

    let mut cursor = Cursor::new(data);

    cursor.seek(SeekFrom::Start(0x1FE))?;
    let trailer = cursor.read_u16::<LittleEndian>()?;
    if trailer != BOOT_SIGNATURE {
        return Err(NtfsError::corrupt(format!("boot sector trailer {:#06x}", trailer)));
    }

    // Bytes per sector at offset 0x0B
    cursor.seek(SeekFrom::Start(0x0B))?;
    let sector_size = cursor.read_u16::<LittleEndian>()? as u32;

    // Sectors per cluster at offset 0x0D
    let sectors_per_cluster = cursor.read_u8()? as u32;

    // Total sectors at offset 0x28, MFT cluster at 0x30
    cursor.seek(SeekFrom::Start(0x28))?;
    let total_sectors = cursor.read_u64::<LittleEndian>()?;
    let mft_cluster = cursor.read_u64::<LittleEndian>()?;

    // MFT record size at offset 0x40
    cursor.seek(SeekFrom::Start(0x40))?;
    let record_size_raw = cursor.read_i8()?;

    if !sector_size.is_power_of_two() || sector_size < 256 {
        return Err(NtfsError::corrupt(format!("bad sector size {}", sector_size)));
    }
    if !sectors_per_cluster.is_power_of_two() {
        return Err(NtfsError::corrupt(format!("bad sectors per cluster {}", sectors_per_cluster)));
    }
    if total_sectors == 0 {
        return Err(NtfsError::corrupt("volume has no sectors"));
    }

    let record_size = if record_size_raw > 0 {
        record_size_raw as u32 * sectors_per_cluster * sector_size
    } else {
        let shift = (record_size_raw as i32).unsigned_abs();
        if shift >= 31 {
            return Err(NtfsError::corrupt(format!("bad record size exponent {}", record_size_raw)));
        }
        1u32 << shift
    };
    if record_size < sector_size {
        return Err(NtfsError::corrupt(format!("MFT record size {} below sector size", record_size)));
    }

    let mft_start_sector = mft_cluster
        .checked_mul(sectors_per_cluster as u64)
        .and_then(|s| s.checked_add(first_sector))
        .ok_or_else(|| NtfsError::corrupt("MFT cluster out of range"))?;

    Ok(PartitionInfo::new(
        sector_size,
        sectors_per_cluster,
        first_sector,
        first_sector.saturating_add(total_sectors - 1),
        mft_start_sector,
    )
    .with_record_size(record_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boot_sector(sector_size: u16, spc: u8, total: u64, mft_cluster: u64, record_raw: i8) -> Vec<u8> {
        let mut b = vec![0u8; 512];
        b[0..3].copy_from_slice(&[0xEB, 0x52, 0x90]);
        b[3..11].copy_from_slice(OEM_ID);
        b[0x0B..0x0D].copy_from_slice(&sector_size.to_le_bytes());
        b[0x0D] = spc;
        b[0x28..0x30].copy_from_slice(&total.to_le_bytes());
        b[0x30..0x38].copy_from_slice(&mft_cluster.to_le_bytes());
        b[0x40] = record_raw as u8;
        b[0x1FE..0x200].copy_from_slice(&BOOT_SIGNATURE.to_le_bytes());
        b
    }

    #[test]
    fn test_parse_boot_sector() {
        let info = parse_boot_sector(&boot_sector(512, 8, 2_000_000, 786_432, -10), 2048).unwrap();
        assert_eq!(info.cluster_size(), 4096);
        assert_eq!(info.record_size, 1024);
        assert_eq!(info.first_sector, 2048);
        assert_eq!(info.last_sector, 2048 + 2_000_000 - 1);
        assert_eq!(info.mft_start_sector, 2048 + 786_432 * 8);
    }

    #[test]
    fn test_positive_record_size() {
        let info = parse_boot_sector(&boot_sector(512, 2, 4096, 4, 1), 0).unwrap();
        assert_eq!(info.record_size, 1024);
    }

    #[test]
    fn test_rejects_non_ntfs() {
        let mut b = boot_sector(512, 8, 100, 4, -10);
        b[3..11].copy_from_slice(b"MSDOS5.0");
        assert!(parse_boot_sector(&b, 0).unwrap_err().is_corruption());
    }

    #[test]
    fn test_rejects_bad_geometry() {
        assert!(parse_boot_sector(&boot_sector(500, 8, 100, 4, -10), 0).is_err());
        assert!(parse_boot_sector(&boot_sector(512, 3, 100, 4, -10), 0).is_err());
        assert!(parse_boot_sector(&boot_sector(512, 8, 0, 4, -10), 0).is_err());
        assert!(parse_boot_sector(&boot_sector(512, 8, 100, 4, -8), 0).is_err());
    }

    #[test]
    fn test_missing_trailer() {
        let mut b = boot_sector(512, 8, 100, 4, -10);
        b[0x1FF] = 0;
        assert!(parse_boot_sector(&b, 0).is_err());
    }
}
