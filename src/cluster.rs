//! Cluster-sized sector buffer
//! Reads one cluster's worth of bytes from an absolute sector offset

use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;

use log::debug;

use crate::error::{NtfsError, Result};
use crate::partition::PartitionInfo;

/// Any seekable byte source over the volume (device handle, image file, cursor)
pub trait Channel: Read + Seek {}

impl<T: Read + Seek + ?Sized> Channel for T {}

/// One cluster of raw volume bytes.
///
/// The bytes live behind an `Arc` so attribute views and run decoders can
/// keep reading them after the owner is dropped or re-read.
pub struct SectorBuffer {
    info: Arc<PartitionInfo>,
    size: usize,
    data: Option<Arc<[u8]>>,
}

impl SectorBuffer {
    pub fn new(info: Arc<PartitionInfo>) -> Self {
        let size = info.cluster_size();
        SectorBuffer { info, size, data: None }
    }

    /// Buffer of at least `min_len` bytes, rounded up to whole clusters
    pub fn spanning(info: Arc<PartitionInfo>, min_len: usize) -> Self {
        let cluster = info.cluster_size().max(1);
        let size = min_len.div_ceil(cluster).max(1) * cluster;
        SectorBuffer { info, size, data: None }
    }

    pub fn partition(&self) -> &Arc<PartitionInfo> {
        &self.info
    }

    /// Reserve a zeroed cluster, dropping any buffer held before
    pub fn allocate(&mut self) {
        self.release();
        self.data = Some(Arc::from(vec![0u8; self.size]));
    }

    /// Read one buffer's worth of bytes starting at an absolute sector
    pub fn read_from_sector<R: Channel + ?Sized>(&mut self, sector: u64, channel: &mut R) -> Result<()> {
        self.load_checked(sector, channel, |_| Ok(()))
    }

    /// Read a cluster and publish it only if `check` accepts (and possibly
    /// repairs) the raw bytes. On any failure the buffer ends up released.
    pub(crate) fn load_checked<R, F>(&mut self, sector: u64, channel: &mut R, check: F) -> Result<()>
    where
        R: Channel + ?Sized,
        F: FnOnce(&mut [u8]) -> Result<()>,
    {
        self.release();

        let mut buffer = vec![0u8; self.size];
        let offset = self.info.sector_to_bytes(sector);

        channel
            .seek(SeekFrom::Start(offset))
            .map_err(|source| NtfsError::IoFault { sector, source })?;
        channel
            .read_exact(&mut buffer)
            .map_err(|source| NtfsError::IoFault { sector, source })?;

        check(&mut buffer)?;

        debug!("Loaded cluster at sector {} ({} bytes)", sector, buffer.len());
        self.data = Some(Arc::from(buffer));
        Ok(())
    }

    /// Drop the buffer; other holders of the bytes keep their copy alive
    pub fn release(&mut self) {
        self.data = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.data.is_some()
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// A new shared handle on the current bytes
    pub fn shared(&self) -> Option<Arc<[u8]>> {
        self.data.clone()
    }

    /// Length of the held buffer (0 when released)
    pub fn len(&self) -> usize {
        self.data.as_ref().map_or(0, |d| d.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
