//! One mapped memory region and its metadata.

use crate::error::{ChainError, Result};
use crate::types::ChainId;
use memmap2::{MmapMut, MmapOptions};
use std::fs::File;

/// Get the system page size in bytes.
fn page_size() -> u64 {
    // SAFETY: sysconf with a valid name has no preconditions.
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as u64 }
}

/// An owned memory mapping, anonymous or file-backed.
///
/// File offsets handed to `mmap` must be page-aligned; chain segment
/// boundaries are not. A file-backed mapping therefore starts at the
/// aligned-down offset and exposes a `base` shifted by the difference,
/// so callers always see the address of the requested file byte.
pub(crate) struct Mapping {
    map: MmapMut,
    /// Address of the first exposed byte.
    base: usize,
    /// Exposed length in bytes.
    len: usize,
    /// Whether writes reach a backing file.
    backed: bool,
}

impl Mapping {
    /// Map `len` bytes of anonymous memory.
    pub fn anonymous(len: usize) -> Result<Self> {
        let mut map = MmapMut::map_anon(len).map_err(|e| ChainError::Map {
            cause: e.to_string(),
        })?;
        let base = map.as_mut_ptr() as usize;
        Ok(Self {
            map,
            base,
            len,
            backed: false,
        })
    }

    /// Map `len` bytes of `file` starting at byte `start`, shared.
    ///
    /// The file must already be at least `start + len` bytes long.
    pub fn file_backed(file: &File, start: u64, len: usize) -> Result<Self> {
        let page = page_size();
        let aligned = start - (start % page);
        let delta = (start - aligned) as usize;
        // SAFETY: the mapping is shared and stays alive while any chain
        // references it; external truncation of the file is the
        // caller's contract violation.
        let mut map = unsafe {
            MmapOptions::new()
                .offset(aligned)
                .len(len + delta)
                .map_mut(file)
        }
        .map_err(|e| ChainError::Map {
            cause: e.to_string(),
        })?;
        let base = map.as_mut_ptr() as usize + delta;
        Ok(Self {
            map,
            base,
            len,
            backed: true,
        })
    }

    /// Address of the first exposed byte.
    #[must_use]
    pub fn base(&self) -> usize {
        self.base
    }

    /// Exposed length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether this mapping writes back to a file.
    #[must_use]
    pub fn is_backed(&self) -> bool {
        self.backed
    }

    /// Flush dirty pages to the backing file, if any.
    pub fn flush(&self) -> Result<()> {
        if self.backed {
            self.map.flush().map_err(|e| ChainError::Map {
                cause: e.to_string(),
            })?;
        }
        Ok(())
    }
}

/// Metadata for one segment: which chain it belongs to, where it is
/// mapped, and which chain positions it covers. The mapping itself is
/// owned here, so dropping the record unmaps the segment.
pub(crate) struct LinkRecord {
    /// The chain this segment belongs to.
    pub chain: ChainId,
    /// Base address of the segment's first byte.
    pub base: usize,
    /// Segment length in bytes.
    pub len: usize,
    /// Chain position of the segment's first byte.
    pub start: u64,
    /// The owned mapping.
    pub mapping: Mapping,
}

impl LinkRecord {
    /// Create a record over `mapping` covering chain positions
    /// `start .. start + mapping.len()`.
    pub fn new(chain: ChainId, start: u64, mapping: Mapping) -> Self {
        Self {
            chain,
            base: mapping.base(),
            len: mapping.len(),
            start,
            mapping,
        }
    }

    /// Check whether `addr` falls inside this segment.
    #[must_use]
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.base && addr < self.base + self.len
    }
}
