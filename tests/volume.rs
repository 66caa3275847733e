//! End-to-end decoding of a small synthetic NTFS volume with a fragmented
//! MFT and a file whose $DATA lives in an extension record.

use std::io::Cursor;
use std::sync::Arc;

use mft_scrounge::attribute::{ATTR_ATTRIBUTE_LIST, ATTR_DATA, ATTR_STANDARD_INFORMATION};
use mft_scrounge::boot::parse_boot_sector;
use mft_scrounge::{MftMap, MftRecord, MftReference, PartitionInfo, RecordLocator};

const SECTOR: usize = 512;
const RECORD_LEN: usize = 1024;
const TOTAL_SECTORS: u64 = 1024;

// 4 records at cluster 16, then 4 records at cluster 16 + 0x54 = 100
const MFT_RUNS: [u8; 7] = [0x11, 0x04, 0x10, 0x11, 0x04, 0x54, 0x00];

fn boot_sector() -> Vec<u8> {
    let mut b = vec![0u8; SECTOR];
    b[0..3].copy_from_slice(&[0xEB, 0x52, 0x90]);
    b[3..11].copy_from_slice(b"NTFS    ");
    b[0x0B..0x0D].copy_from_slice(&512u16.to_le_bytes());
    b[0x0D] = 2;
    b[0x28..0x30].copy_from_slice(&TOTAL_SECTORS.to_le_bytes());
    b[0x30..0x38].copy_from_slice(&16u64.to_le_bytes());
    b[0x40] = (-10i8) as u8;
    b[0x1FE] = 0x55;
    b[0x1FF] = 0xAA;
    b
}

fn resident(attr_type: u32, value: &[u8]) -> Vec<u8> {
    let length = (0x18 + value.len() + 7) & !7;
    let mut a = vec![0u8; length];
    a[0..4].copy_from_slice(&attr_type.to_le_bytes());
    a[4..8].copy_from_slice(&(length as u32).to_le_bytes());
    a[0x10..0x14].copy_from_slice(&(value.len() as u32).to_le_bytes());
    a[0x14..0x16].copy_from_slice(&0x18u16.to_le_bytes());
    a[0x18..0x18 + value.len()].copy_from_slice(value);
    a
}

fn non_resident(attr_type: u32, runs: &[u8]) -> Vec<u8> {
    let length = (0x40 + runs.len() + 7) & !7;
    let mut a = vec![0u8; length];
    a[0..4].copy_from_slice(&attr_type.to_le_bytes());
    a[4..8].copy_from_slice(&(length as u32).to_le_bytes());
    a[8] = 1;
    a[0x20..0x22].copy_from_slice(&0x40u16.to_le_bytes());
    a[0x40..0x40 + runs.len()].copy_from_slice(runs);
    a
}

fn list_entry(attr_type: u32, record: u64) -> Vec<u8> {
    let mut e = vec![0u8; 0x20];
    e[0..4].copy_from_slice(&attr_type.to_le_bytes());
    e[4..6].copy_from_slice(&0x20u16.to_le_bytes());
    e[16..24].copy_from_slice(&MftReference::new(record, 1).0.to_le_bytes());
    e
}

fn record(attrs: &[Vec<u8>]) -> Vec<u8> {
    let mut r = vec![0u8; RECORD_LEN];
    r[0..4].copy_from_slice(b"FILE");
    r[4..6].copy_from_slice(&0x30u16.to_le_bytes());
    r[6..8].copy_from_slice(&3u16.to_le_bytes());
    r[0x14..0x16].copy_from_slice(&0x38u16.to_le_bytes());
    r[0x16..0x18].copy_from_slice(&1u16.to_le_bytes());

    let mut pos = 0x38;
    for a in attrs {
        r[pos..pos + a.len()].copy_from_slice(a);
        pos += a.len();
    }
    r[pos..pos + 4].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes());

    r[0x30..0x32].copy_from_slice(&0x0003u16.to_le_bytes());
    for i in 0..2 {
        let tail = (i + 1) * SECTOR - 2;
        r[0x32 + i * 2] = r[tail];
        r[0x33 + i * 2] = r[tail + 1];
        r[tail..tail + 2].copy_from_slice(&0x0003u16.to_le_bytes());
    }
    r
}

fn record_sector(index: usize) -> usize {
    if index < 4 {
        32 + index * 2
    } else {
        200 + (index - 4) * 2
    }
}

fn volume() -> Vec<u8> {
    let mut disk = vec![0u8; TOTAL_SECTORS as usize * SECTOR];
    disk[..SECTOR].copy_from_slice(&boot_sector());

    let mut records = vec![record(&[]); 8];
    records[0] = record(&[resident(ATTR_STANDARD_INFORMATION, &[0; 48]), non_resident(ATTR_DATA, &MFT_RUNS)]);
    records[5] = record(&[
        resident(ATTR_STANDARD_INFORMATION, &[0; 48]),
        resident(ATTR_ATTRIBUTE_LIST, &[list_entry(ATTR_STANDARD_INFORMATION, 5), list_entry(ATTR_DATA, 6)].concat()),
    ]);
    records[6] = record(&[resident(ATTR_DATA, b"recovered payload")]);

    for (i, r) in records.iter().enumerate() {
        let at = record_sector(i) * SECTOR;
        disk[at..at + RECORD_LEN].copy_from_slice(r);
    }
    disk
}

fn load(disk: &mut Cursor<Vec<u8>>) -> (Arc<PartitionInfo>, Arc<MftMap>) {
    let info = Arc::new(parse_boot_sector(&disk.get_ref()[..SECTOR], 0).unwrap());
    let mut mft = MftRecord::new(Arc::clone(&info));
    mft.read(info.mft_start_sector, &mut *disk).unwrap();

    let mut map = MftMap::new(Arc::clone(&info));
    map.load(&mft, Some(disk)).unwrap();
    (info, Arc::new(map))
}

#[test]
fn test_boot_to_map() {
    let mut disk = Cursor::new(volume());
    let (info, map) = load(&mut disk);

    assert_eq!(info.mft_start_sector, 32);
    assert_eq!(map.blocks().len(), 2);
    assert_eq!(map.total_length(), 8);

    for i in 0..8 {
        assert_eq!(map.sector_for_index(i as u64), Some(record_sector(i) as u64));
    }
}

#[test]
fn test_every_index_maps_inside_partition() {
    let mut disk = Cursor::new(volume());
    let (info, map) = load(&mut disk);

    for i in 0..map.total_length() {
        let sector = map.sector_for_index(i).unwrap();
        assert!(sector >= info.first_sector && sector <= info.last_sector);
    }
    assert_eq!(map.sector_for_index(map.total_length()), None);
    assert_eq!(map.sector_for_index(u64::MAX), None);
}

#[test]
fn test_attribute_list_through_fragmented_mft() {
    let mut disk = Cursor::new(volume());
    let (info, map) = load(&mut disk);
    let locator: Arc<dyn RecordLocator> = map.clone();

    let mut file = MftRecord::with_locator(Arc::clone(&info), Arc::clone(&locator));
    file.read(map.sector_for_index(5).unwrap(), &mut disk).unwrap();
    let via_list = file.find_attribute(ATTR_DATA, Some(&mut disk)).unwrap().unwrap();

    let mut extension = MftRecord::with_locator(Arc::clone(&info), locator);
    extension.read(map.sector_for_index(6).unwrap(), &mut disk).unwrap();
    let direct = extension.find_attribute(ATTR_DATA, None).unwrap().unwrap();

    assert_eq!(via_list.is_resident(), direct.is_resident());
    assert_eq!(via_list.resident_data(), direct.resident_data());
    assert_eq!(via_list.resident_data(), b"recovered payload");
}

#[test]
fn test_contiguous_locator_misses_fragmented_record() {
    let mut disk = Cursor::new(volume());
    let (info, map) = load(&mut disk);

    // Record 6 is not where a contiguous MFT would put it
    let mut file = MftRecord::new(Arc::clone(&info));
    file.read(map.sector_for_index(5).unwrap(), &mut disk).unwrap();
    assert!(file.find_attribute(ATTR_DATA, Some(&mut disk)).unwrap().is_none());
}

#[test]
fn test_corrupt_records_leave_nothing_loaded() {
    let mut raw = volume();
    raw[record_sector(2) * SECTOR] = b'X';
    raw[record_sector(3) * SECTOR + SECTOR - 1] ^= 0x10;
    let mut disk = Cursor::new(raw);
    let (info, map) = load(&mut disk);

    let mut rec = MftRecord::new(Arc::clone(&info));
    for index in [2u64, 3] {
        let err = rec.read(map.sector_for_index(index).unwrap(), &mut disk).unwrap_err();
        assert!(err.is_corruption());
        assert!(!rec.is_loaded());
        assert!(rec.bytes().is_none());
    }

    // The same record object is still usable for a healthy index
    rec.read(map.sector_for_index(4).unwrap(), &mut disk).unwrap();
    assert!(rec.is_loaded());
}

#[test]
fn test_map_locator_for_references() {
    let mut disk = Cursor::new(volume());
    let (_, map) = load(&mut disk);
    assert_eq!(map.sector_for_reference(MftReference::new(7, 2)), Some(206));
    assert_eq!(map.sector_for_reference(MftReference::new(8, 2)), None);
}
