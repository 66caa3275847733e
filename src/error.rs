//! Error types for the MFT decoding core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NtfsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Read fault at sector {sector}: {source}")]
    IoFault {
        sector: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("NTFS structure invalid: {0}")]
    StructuralCorruption(String),

    #[error("Out of memory while building the MFT map")]
    OutOfMemory,
}

impl NtfsError {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        NtfsError::StructuralCorruption(msg.into())
    }

    /// True for failures caused by the bytes on disk rather than the device
    pub fn is_corruption(&self) -> bool {
        matches!(self, NtfsError::StructuralCorruption(_))
    }
}

pub type Result<T> = std::result::Result<T, NtfsError>;
