//! Non-resident data run decoder
//!
//! Each run is a header byte (low nibble = count length, high nibble =
//! offset length) followed by a little-endian cluster count and a signed
//! little-endian cluster delta relative to the previous run.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{NtfsError, Result};

/// One decoded extent
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRun {
    /// Absolute starting cluster (unchanged from the previous run when sparse)
    pub first_cluster: u64,
    pub cluster_count: u64,
    pub sparse: bool,
}

/// Cursor over a run list inside a shared record buffer
pub struct DataRunDecoder {
    mem: Arc<[u8]>,
    start: usize,
    end: usize,
    cursor: Option<usize>,
    first_cluster: u64,
    num_clusters: u64,
    sparse: bool,
}

impl DataRunDecoder {
    /// `start..end` is the run list's window inside `mem`
    pub(crate) fn new(mem: Arc<[u8]>, start: usize, end: usize) -> Self {
        let end = end.min(mem.len());
        DataRunDecoder {
            mem,
            start,
            end,
            cursor: None,
            first_cluster: 0,
            num_clusters: 0,
            sparse: false,
        }
    }

    /// Reset to the beginning of the list and decode the first run
    pub fn first_run(&mut self) -> Result<Option<DataRun>> {
        self.cursor = Some(self.start);
        self.first_cluster = 0;
        self.num_clusters = 0;
        self.sparse = false;
        self.next_run()
    }

    /// Decode the run after the current one.
    ///
    /// A malformed run ends the list: the error is returned once and every
    /// later call yields `Ok(None)`.
    pub fn next_run(&mut self) -> Result<Option<DataRun>> {
        let Some(pos) = self.cursor else {
            return Ok(None);
        };

        match self.decode_at(pos) {
            Ok(Some(next)) => {
                self.cursor = Some(next);
                Ok(Some(self.current()))
            }
            Ok(None) => {
                self.cursor = None;
                Ok(None)
            }
            Err(e) => {
                self.cursor = None;
                Err(e)
            }
        }
    }

    /// Decode everything from the start
    pub fn collect_runs(&mut self) -> Result<Vec<DataRun>> {
        let mut runs = Vec::new();
        let mut run = self.first_run()?;
        while let Some(r) = run {
            runs.push(r);
            run = self.next_run()?;
        }
        Ok(runs)
    }

    pub fn first_cluster(&self) -> u64 {
        self.first_cluster
    }

    pub fn cluster_count(&self) -> u64 {
        self.num_clusters
    }

    pub fn is_sparse(&self) -> bool {
        self.sparse
    }

    fn current(&self) -> DataRun {
        DataRun {
            first_cluster: self.first_cluster,
            cluster_count: self.num_clusters,
            sparse: self.sparse,
        }
    }

    fn decode_at(&mut self, mut pos: usize) -> Result<Option<usize>> {
        if pos >= self.end {
            return Err(NtfsError::corrupt("data run list has no terminator"));
        }

        let header = self.mem[pos];
        if header == 0 {
            return Ok(None);
        }

        let cb_len = (header & 0x0F) as usize;
        let cb_off = (header >> 4) as usize;
        if cb_len == 0 || cb_len > 8 || cb_off > 8 {
            return Err(NtfsError::corrupt(format!("bad data run header {:#04x}", header)));
        }

        pos += 1;
        if pos + cb_len + cb_off > self.end {
            return Err(NtfsError::corrupt("data run extends past its attribute"));
        }

        let count = read_unsigned(&self.mem[pos..pos + cb_len]);
        pos += cb_len;

        // A missing offset field is a zero delta, no sign byte to probe
        let offset = read_signed(&self.mem[pos..pos + cb_off]);
        pos += cb_off;

        self.num_clusters = count;
        if offset == 0 {
            self.sparse = true;
        } else {
            self.sparse = false;
            self.first_cluster = self.first_cluster.checked_add_signed(offset).ok_or_else(|| {
                NtfsError::corrupt(format!(
                    "data run delta {} moves cluster {} off the volume",
                    offset, self.first_cluster
                ))
            })?;
        }

        Ok(Some(pos))
    }
}

fn read_unsigned(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .rev()
        .fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

fn read_signed(bytes: &[u8]) -> i64 {
    let Some(&top) = bytes.last() else {
        return 0;
    };
    let fill: u64 = if top & 0x80 != 0 { !0 } else { 0 };
    let mut value = read_unsigned(bytes);
    if bytes.len() < 8 {
        value |= fill << (bytes.len() * 8);
    }
    value as i64
}
