//! MFT Scrounge - NTFS metadata decoding core
//!
//! Reads raw sectors from a possibly damaged NTFS volume and rebuilds:
//! - MFT records, with magic and fixup validation
//! - Attribute headers, including attributes moved out through $ATTRIBUTE_LIST
//! - Non-resident data runs
//! - The MFT's own block map (record index -> absolute sector)
//!
//! No OS filesystem driver is involved; every read is a seek plus read on
//! a caller-owned channel.

pub mod attribute;
pub mod attribute_list;
pub mod boot;
pub mod cluster;
pub mod data_run;
pub mod error;
pub mod fixup;
pub mod mft_map;
pub mod partition;
mod raw;
pub mod record;
pub mod reference;

pub use attribute::AttributeView;
pub use cluster::{Channel, SectorBuffer};
pub use data_run::{DataRun, DataRunDecoder};
pub use error::{NtfsError, Result};
pub use mft_map::{MftBlock, MftMap};
pub use partition::PartitionInfo;
pub use record::MftRecord;
pub use reference::{MftReference, RecordLocator};
