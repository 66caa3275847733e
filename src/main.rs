//! MFT Scrounge - command line inspector
//!
//! Opens a raw volume or disk image, reads the NTFS boot sector and the
//! MFT's own record, builds the MFT block map and prints JSON describing
//! the map or individual records.

use std::env;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;

use log::{error, info};
use serde::Serialize;

use mft_scrounge::boot::parse_boot_sector;
use mft_scrounge::{AttributeView, MftBlock, MftMap, MftRecord, NtfsError, PartitionInfo, RecordLocator};

/// Resident bytes shown per attribute
const DUMP_LIMIT: usize = 64;

#[derive(Serialize, Debug)]
struct MapReport {
    partition: PartitionInfo,
    total_records: u64,
    blocks: Vec<MftBlock>,
}

#[derive(Serialize, Debug)]
struct AttributeReport {
    attr_type: u32,
    offset: usize,
    resident: bool,
    size: u64,
    name_length: u8,
    data_hex: Option<String>,
    runs: Option<Vec<mft_scrounge::DataRun>>,
}

#[derive(Serialize, Debug)]
struct RecordReport {
    index: u64,
    sector: u64,
    header: mft_scrounge::record::RecordHeader,
    attributes: Vec<AttributeReport>,
}

struct Volume {
    file: File,
    info: Arc<PartitionInfo>,
    map: Arc<MftMap>,
}

fn open_volume(path: &str, first_sector: u64) -> Result<Volume, NtfsError> {
    let mut file = File::open(path)?;

    file.seek(SeekFrom::Start(first_sector * 512))?;
    let mut boot = vec![0u8; 512];
    file.read_exact(&mut boot)?;

    let info = Arc::new(parse_boot_sector(&boot, first_sector)?);
    info!(
        "Volume: {} byte clusters, MFT at sector {}, {} byte records",
        info.cluster_size(),
        info.mft_start_sector,
        info.record_size
    );

    let mut mft = MftRecord::new(Arc::clone(&info));
    mft.read(info.mft_start_sector, &mut file)?;

    let mut map = MftMap::new(Arc::clone(&info));
    map.load(&mft, Some(&mut file))?;

    Ok(Volume { file, info, map: Arc::new(map) })
}

fn describe(view: &AttributeView) -> AttributeReport {
    let (size, data_hex, runs) = if view.is_resident() {
        let data = view.resident_data();
        let shown = &data[..data.len().min(DUMP_LIMIT)];
        (data.len() as u64, Some(hex::encode(shown)), None)
    } else {
        let runs = view.data_run_decoder().collect_runs().ok();
        (view.real_size().unwrap_or(0), None, runs)
    };

    AttributeReport {
        attr_type: view.attr_type(),
        offset: view.offset(),
        resident: view.is_resident(),
        size,
        name_length: view.name_length(),
        data_hex,
        runs,
    }
}

fn inspect_record(volume: &mut Volume, index: u64) -> Result<RecordReport, NtfsError> {
    let sector = volume
        .map
        .sector_for_index(index)
        .ok_or_else(|| NtfsError::StructuralCorruption(format!("record {} is outside the MFT", index)))?;

    let locator: Arc<dyn RecordLocator> = volume.map.clone();
    let mut record = MftRecord::with_locator(Arc::clone(&volume.info), locator);
    record.read(sector, &mut volume.file)?;

    let header = *record
        .header()
        .ok_or_else(|| NtfsError::StructuralCorruption("record not loaded".to_string()))?;

    let attributes = record.attributes()?.iter().map(describe).collect();

    Ok(RecordReport { index, sector, header, attributes })
}

fn parse_number(arg: Option<&String>, default: u64) -> u64 {
    match arg {
        Some(s) => s.parse().unwrap_or_else(|_| {
            eprintln!("Not a number: {}", s);
            std::process::exit(1);
        }),
        None => default,
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let command = &args[1];

    match command.as_str() {
        "map" => {
            if args.len() < 3 {
                eprintln!("Usage: mft_scrounge map <image> [first_sector]");
                std::process::exit(1);
            }
            let first_sector = parse_number(args.get(3), 0);

            match open_volume(&args[2], first_sector) {
                Ok(volume) => {
                    let report = MapReport {
                        partition: (*volume.info).clone(),
                        total_records: volume.map.total_length(),
                        blocks: volume.map.blocks().to_vec(),
                    };
                    println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default());
                }
                Err(e) => {
                    error!("Failed to load MFT: {}", e);
                    eprintln!("{{\"success\": false, \"error\": \"{}\"}}", e);
                    std::process::exit(1);
                }
            }
        }

        "record" => {
            if args.len() < 4 {
                eprintln!("Usage: mft_scrounge record <image> <index> [first_sector]");
                std::process::exit(1);
            }
            let index = parse_number(args.get(3), 0);
            let first_sector = parse_number(args.get(4), 0);

            let result = open_volume(&args[2], first_sector).and_then(|mut volume| inspect_record(&mut volume, index));
            match result {
                Ok(report) => {
                    println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default());
                }
                Err(e) => {
                    eprintln!("{{\"success\": false, \"error\": \"{}\"}}", e);
                    std::process::exit(1);
                }
            }
        }

        "help" | "--help" | "-h" => {
            print_usage();
        }

        "version" | "--version" | "-v" => {
            println!("MFT Scrounge v{}", env!("CARGO_PKG_VERSION"));
            println!("NTFS MFT record and data run decoder");
        }

        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    eprintln!(
        "
MFT Scrounge v{}
================================

COMMANDS:
  map <image> [first_sector]      Build the MFT block map and print it
  record <image> <index> [first_sector]
                                  Read one MFT record and list its attributes

OTHER:
  help, --help, -h                Show this help message
  version, --version, -v          Show version information

NOTES:
  - <image> may be a raw device (needs read permission) or an image file
  - first_sector is the absolute 512-byte sector of the NTFS boot sector
  - Set RUST_LOG=debug for per-record tracing
",
        env!("CARGO_PKG_VERSION")
    );
}
