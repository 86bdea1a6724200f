//! The two cross-indexes shared by all chains.

use crate::chain::segment::LinkRecord;
use crate::error::{ChainError, Result};
use crate::types::{ChainId, Position};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::sync::Arc;

/// Per-chain bookkeeping that lives outside the chain.
pub(crate) struct ChainMeta {
    /// Total chain length in bytes (sum of segment lengths).
    pub total_len: u64,
    /// Length of the caller-supplied prefix at the chain head.
    pub prefix_len: u64,
    /// Dup of the caller's descriptor for file-backed chains, used to
    /// extend the file on growth. The caller's own descriptor is never
    /// closed or consumed.
    pub file: Option<File>,
    /// Serializes allocator work within the chain.
    pub alloc_lock: Arc<Mutex<()>>,
}

impl ChainMeta {
    pub fn new(total_len: u64, prefix_len: u64, file: Option<File>) -> Self {
        Self {
            total_len,
            prefix_len,
            file,
            alloc_lock: Arc::new(Mutex::new(())),
        }
    }
}

/// Cross-indexes answering *where in memory does position P in chain C
/// live* and *which chain and position does address A belong to*.
///
/// Guarded as a whole by the process-wide readers-writer lock in the
/// [`Manager`](crate::chain::Manager): translations take the shared
/// lock, chain creation/destruction/extension take the exclusive lock.
pub(crate) struct ChainIndex {
    /// Chain id -> ordered map from segment start position to base address.
    pub by_chain: HashMap<ChainId, BTreeMap<u64, usize>>,
    /// Segment base address -> link record.
    pub by_addr: BTreeMap<usize, LinkRecord>,
    /// Chain id -> per-chain state.
    pub chains: HashMap<ChainId, ChainMeta>,
}

impl ChainIndex {
    pub fn new() -> Self {
        Self {
            by_chain: HashMap::new(),
            by_addr: BTreeMap::new(),
            chains: HashMap::new(),
        }
    }

    /// Register a segment in both indexes.
    pub fn register(&mut self, record: LinkRecord) {
        self.by_chain
            .entry(record.chain)
            .or_default()
            .insert(record.start, record.base);
        self.by_addr.insert(record.base, record);
    }

    /// Translate a chain position to an absolute address.
    ///
    /// With a nonzero `len`, the whole span `position .. position + len`
    /// must lie inside one segment.
    pub fn address_of(&self, chain: ChainId, position: u64, len: u64) -> Result<usize> {
        let spans = self
            .by_chain
            .get(&chain)
            .ok_or(ChainError::UnknownChain { chain })?;
        let discontiguous = || ChainError::Discontiguous {
            chain,
            position: Position::new(position),
            length: len,
        };
        let (&start, &base) = spans
            .range(..=position)
            .next_back()
            .ok_or_else(discontiguous)?;
        let record = &self.by_addr[&base];
        // The span (at least one byte) must not cross the segment end.
        let end = position.checked_add(len.max(1)).ok_or_else(discontiguous)?;
        if end > start + record.len as u64 {
            return Err(discontiguous());
        }
        Ok(base + (position - start) as usize)
    }

    /// Translate an absolute address to its chain and position.
    ///
    /// With a nonzero `len`, the whole span must lie inside one segment.
    pub fn locate(&self, addr: usize, len: u64) -> Result<(ChainId, u64)> {
        let (_, record) = self
            .by_addr
            .range(..=addr)
            .next_back()
            .ok_or(ChainError::UnmappedAddress { address: addr })?;
        if !record.contains(addr) {
            return Err(ChainError::UnmappedAddress { address: addr });
        }
        let position = record.start + (addr - record.base) as u64;
        let discontiguous = || ChainError::Discontiguous {
            chain: record.chain,
            position: Position::new(position),
            length: len,
        };
        let end = addr
            .checked_add(len.max(1) as usize)
            .ok_or_else(discontiguous)?;
        if end > record.base + record.len {
            return Err(discontiguous());
        }
        Ok((record.chain, position))
    }

    /// Remove every segment of `chain` from both indexes, returning the
    /// records (and hence the mappings) to the caller for teardown.
    pub fn unregister_chain(&mut self, chain: ChainId) -> Vec<LinkRecord> {
        let Some(spans) = self.by_chain.remove(&chain) else {
            return Vec::new();
        };
        spans
            .values()
            .filter_map(|base| self.by_addr.remove(base))
            .collect()
    }
}
