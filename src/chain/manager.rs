//! The process-wide manager of mapped memory chains.

use crate::chain::allocator::{self, BLOCK_HEADER_BYTES, FIRST_ALLOCATION_OFFSET};
use crate::chain::index::{ChainIndex, ChainMeta};
use crate::chain::segment::{LinkRecord, Mapping};
use crate::error::{ChainError, Result};
use crate::types::{ChainId, Position};
use parking_lot::{Mutex, RwLock};
use std::fs::File;
use std::ptr::{self, NonNull};
use std::sync::{Arc, OnceLock};

/// Starting size of a fresh chain in bytes.
pub const BASE_SIZE: u64 = 1024;

/// Maximum caller-supplied prefix length in bytes.
///
/// The allocator header must fit in the head segment after the prefix,
/// so the prefix is bounded.
pub const MAX_PREFIX_SIZE: usize = 16;

/// The one index shared by every chain in the process.
///
/// Initialized on first use and alive until process exit. Translation
/// takes the shared lock; chain creation, destruction and extension
/// take the exclusive lock.
static INDEX: OnceLock<RwLock<ChainIndex>> = OnceLock::new();

fn index() -> &'static RwLock<ChainIndex> {
    INDEX.get_or_init(|| RwLock::new(ChainIndex::new()))
}

/// Pull the human-readable cause out of a mapping error.
fn map_cause(error: ChainError) -> String {
    match error {
        ChainError::Map { cause } => cause,
        other => other.to_string(),
    }
}

/// Global manager of mapped memory chains.
///
/// The manager owns one or more chains, each potentially backed by an
/// open file. Chains are made of mapped segments, and each segment can
/// land at a different base address. When a file is first mapped it
/// becomes a single segment; more segments are mapped later to satisfy
/// allocations from inside the chain.
///
/// All operations are associated functions against process-wide state,
/// because pointers stored *inside* chain memory have nothing but that
/// state to resolve themselves through.
///
/// # Locking
///
/// A readers-writer lock guards the chain index; one mutex per chain
/// serializes its allocator. Allocator work never runs under the index
/// write lock: the order is always allocator mutex first, index write
/// lock second. Within one chain, allocator operations are
/// linearizable; across chains they proceed in parallel.
///
/// # Pointer invalidation
///
/// Any call that may grow a chain (every allocation) invalidates every
/// absolute address into that chain; callers re-resolve from positions
/// afterwards. Positions themselves are never invalidated before
/// [`destroy_chain`](Manager::destroy_chain).
pub struct Manager;

impl Manager {
    /// Create a chain not backed by any file.
    ///
    /// The given prefix bytes occur before the chain allocator data
    /// structures at the very start of the chain.
    ///
    /// # Errors
    /// `BadFile` if the prefix exceeds [`MAX_PREFIX_SIZE`]; `Map` if
    /// the mapping cannot be created.
    pub fn create_chain(prefix: &[u8]) -> Result<ChainId> {
        Self::check_prefix(prefix)?;
        let mapping = Mapping::anonymous(BASE_SIZE as usize)?;
        let base = mapping.base();
        let prefix_len = prefix.len() as u64;
        unsafe {
            ptr::copy_nonoverlapping(prefix.as_ptr(), base as *mut u8, prefix.len());
        }
        allocator::set_up(base, prefix_len, BASE_SIZE - prefix_len);

        let chain = ChainId::from_base(base);
        let mut ix = index().write();
        ix.register(LinkRecord::new(chain, 0, mapping));
        ix.chains
            .insert(chain, ChainMeta::new(BASE_SIZE, prefix_len, None));
        tracing::debug!(%chain, prefix_len, "created anonymous chain");
        Ok(chain)
    }

    /// Create a chain by mapping all of the given open file.
    ///
    /// Modifications to the chain affect the file, and the file grows
    /// as necessary. The manager duplicates the descriptor for its own
    /// use and never closes or consumes the caller's.
    ///
    /// A file holding at most the prefix is completed in place: it is
    /// extended to [`BASE_SIZE`], prefixed, and given a fresh
    /// allocator. A longer file must already contain the allocator
    /// data structures right after the prefix.
    ///
    /// # Errors
    /// `BadFile` if the file is too short for the prefix plus the
    /// allocator structures, or its allocator header is
    /// unrecognizable; `Map` on mapping or file failures.
    pub fn create_chain_in(file: &File, prefix: &[u8]) -> Result<ChainId> {
        Self::check_prefix(prefix)?;
        let prefix_len = prefix.len() as u64;
        let file_len = file
            .metadata()
            .map_err(|e| ChainError::Map {
                cause: e.to_string(),
            })?
            .len();

        let (mapping, total_len) = if file_len <= prefix_len {
            file.set_len(BASE_SIZE).map_err(|e| ChainError::Map {
                cause: e.to_string(),
            })?;
            let mapping = Mapping::file_backed(file, 0, BASE_SIZE as usize)?;
            let base = mapping.base();
            unsafe {
                ptr::copy_nonoverlapping(prefix.as_ptr(), base as *mut u8, prefix.len());
            }
            allocator::set_up(base, prefix_len, BASE_SIZE - prefix_len);
            (mapping, BASE_SIZE)
        } else {
            if file_len < prefix_len + FIRST_ALLOCATION_OFFSET {
                return Err(ChainError::BadFile {
                    cause: format!(
                        "file of {file_len} bytes cannot hold a {}-byte prefix plus the allocator structures",
                        prefix.len()
                    ),
                });
            }
            let mapping = Mapping::file_backed(file, 0, file_len as usize)?;
            if !allocator::header_is_valid(mapping.base(), prefix_len, file_len) {
                return Err(ChainError::BadFile {
                    cause: "unrecognizable allocator header".to_string(),
                });
            }
            (mapping, file_len)
        };

        let dup = file.try_clone().map_err(|e| ChainError::Map {
            cause: e.to_string(),
        })?;
        let chain = ChainId::from_base(mapping.base());
        let mut ix = index().write();
        ix.register(LinkRecord::new(chain, 0, mapping));
        ix.chains
            .insert(chain, ChainMeta::new(total_len, prefix_len, Some(dup)));
        tracing::debug!(%chain, total_len, prefix_len, "created file-backed chain");
        Ok(chain)
    }

    /// Copy `chain` into a new chain whose modifications will not touch
    /// any backing file. The source chain is unchanged.
    ///
    /// Not safe against concurrent modification of the source chain's
    /// contents.
    pub fn dissociated_chain(chain: ChainId) -> Result<ChainId> {
        Self::copy_chain(chain, None)
    }

    /// Copy `chain` into a new chain whose modifications will reach the
    /// given open file. The source chain is unchanged; the descriptor
    /// is duplicated, never consumed.
    ///
    /// Not safe against concurrent modification of the source chain's
    /// contents.
    pub fn associated_chain(chain: ChainId, file: &File) -> Result<ChainId> {
        Self::copy_chain(chain, Some(file))
    }

    fn copy_chain(source: ChainId, dest_file: Option<&File>) -> Result<ChainId> {
        let mut ix = index().write();
        let meta = ix
            .chains
            .get(&source)
            .ok_or(ChainError::UnknownChain { chain: source })?;
        let total_len = meta.total_len;
        let prefix_len = meta.prefix_len;

        let mapping = match dest_file {
            Some(file) => {
                file.set_len(total_len).map_err(|e| ChainError::Map {
                    cause: e.to_string(),
                })?;
                Mapping::file_backed(file, 0, total_len as usize)?
            }
            None => Mapping::anonymous(total_len as usize)?,
        };
        let new_base = mapping.base();

        // memcpy every segment into place, in chain order.
        let spans: Vec<(u64, usize, usize)> = ix.by_chain[&source]
            .iter()
            .map(|(&start, &base)| (start, base, ix.by_addr[&base].len))
            .collect();
        for (start, base, len) in spans {
            unsafe {
                ptr::copy_nonoverlapping(
                    base as *const u8,
                    (new_base + start as usize) as *mut u8,
                    len,
                );
            }
        }

        let dup = dest_file
            .map(File::try_clone)
            .transpose()
            .map_err(|e| ChainError::Map {
                cause: e.to_string(),
            })?;
        let chain = ChainId::from_base(new_base);
        ix.register(LinkRecord::new(chain, 0, mapping));
        ix.chains
            .insert(chain, ChainMeta::new(total_len, prefix_len, dup));
        tracing::debug!(
            source = %source,
            %chain,
            total_len,
            backed = dest_file.is_some(),
            "copied chain"
        );
        Ok(chain)
    }

    /// Destroy the given chain: flush and unmap all of its segments and
    /// close the manager's duplicated descriptor, if any. The caller's
    /// own descriptor stays open.
    ///
    /// Every pointer and position into the chain becomes invalid.
    ///
    /// # Errors
    /// `UnknownChain` if the chain is not registered.
    pub fn destroy_chain(chain: ChainId) -> Result<()> {
        let records = {
            let mut ix = index().write();
            let meta = ix
                .chains
                .remove(&chain)
                .ok_or(ChainError::UnknownChain { chain })?;
            let records = ix.unregister_chain(chain);
            drop(meta);
            records
        };
        for record in &records {
            if let Err(error) = record.mapping.flush() {
                tracing::warn!(%chain, %error, "flush failed while destroying chain");
            }
        }
        drop(records);
        tracing::debug!(%chain, "destroyed chain");
        Ok(())
    }

    /// Get the chain containing `addr`, or [`ChainId::NONE`] if the
    /// address is outside all current chains.
    #[must_use]
    pub fn chain_of(addr: *const u8) -> ChainId {
        index()
            .read()
            .locate(addr as usize, 0)
            .map(|(chain, _)| chain)
            .unwrap_or(ChainId::NONE)
    }

    /// Get the address of the given position in `chain`.
    ///
    /// With a nonzero `len`, the whole span must be contiguous in one
    /// segment.
    ///
    /// # Errors
    /// `NullDereference` for the null position; `UnknownChain`;
    /// `Discontiguous`.
    pub fn address_of(chain: ChainId, position: Position, len: u64) -> Result<NonNull<u8>> {
        if position.is_none() {
            return Err(ChainError::NullDereference);
        }
        let addr = Self::translate(chain, position.get(), len)?;
        Ok(NonNull::new(addr as *mut u8).expect("mapped address is never null"))
    }

    /// Get the chain and position of the given address.
    ///
    /// With a nonzero `len`, the whole span must be contiguous in one
    /// segment.
    ///
    /// # Errors
    /// `UnmappedAddress`; `Discontiguous`.
    pub fn position_of(addr: NonNull<u8>, len: u64) -> Result<(ChainId, Position)> {
        let (chain, position) = Self::locate_raw(addr.as_ptr() as usize, len)?;
        Ok((chain, Position::new(position)))
    }

    /// Find the address of `position` in the chain that `here` lives in.
    ///
    /// # Errors
    /// `NullDereference` for the null position; `UnmappedAddress` if
    /// `here` is outside every chain; `Discontiguous`.
    pub fn address_in_same_chain(here: NonNull<u8>, position: Position) -> Result<NonNull<u8>> {
        if position.is_none() {
            return Err(ChainError::NullDereference);
        }
        let ix = index().read();
        let (chain, _) = ix.locate(here.as_ptr() as usize, 0)?;
        let addr = ix.address_of(chain, position.get(), 0)?;
        Ok(NonNull::new(addr as *mut u8).expect("mapped address is never null"))
    }

    /// Find the position of `addr` in the chain that `here` lives in.
    ///
    /// # Errors
    /// `CrossChain` if the two addresses live in different chains;
    /// `UnmappedAddress` if either is outside every chain.
    pub fn position_in_same_chain(here: NonNull<u8>, addr: NonNull<u8>) -> Result<Position> {
        let ix = index().read();
        let (here_chain, _) = ix.locate(here.as_ptr() as usize, 0)?;
        let (addr_chain, position) = ix.locate(addr.as_ptr() as usize, 0)?;
        if here_chain != addr_chain {
            return Err(ChainError::CrossChain {
                ptr_chain: here_chain,
                target_chain: addr_chain,
            });
        }
        Ok(Position::new(position))
    }

    /// Allocate `bytes` from the given chain.
    ///
    /// May grow the chain, which invalidates every absolute address
    /// into it (the returned one is fresh).
    ///
    /// # Errors
    /// `UnknownChain`; `OutOfMemory` if growth fails, in which case the
    /// allocator is unchanged; `CorruptFreeList` on invariant
    /// violations.
    pub fn allocate_from(chain: ChainId, bytes: u64) -> Result<NonNull<u8>> {
        let (lock, prefix_len) = Self::chain_info(chain)?;
        let _guard = lock.lock();
        allocator::allocate(chain, prefix_len, bytes)
    }

    /// Allocate `bytes` from the chain containing `here`.
    ///
    /// # Errors
    /// `UnmappedAddress` plus the errors of
    /// [`allocate_from`](Manager::allocate_from).
    pub fn allocate_from_same_chain(here: NonNull<u8>, bytes: u64) -> Result<NonNull<u8>> {
        let (chain, _) = Self::locate_raw(here.as_ptr() as usize, 0)?;
        Self::allocate_from(chain, bytes)
    }

    /// Free the allocated block whose body starts at `addr`, in the
    /// chain it belongs to.
    ///
    /// # Errors
    /// `UnmappedAddress`; `DoubleFree` if the block is already free;
    /// `CorruptFreeList` on invariant violations.
    pub fn deallocate(addr: NonNull<u8>) -> Result<()> {
        let header_addr = (addr.as_ptr() as usize)
            .checked_sub(BLOCK_HEADER_BYTES as usize)
            .ok_or(ChainError::UnmappedAddress {
                address: addr.as_ptr() as usize,
            })?;
        let (chain, _) = Self::locate_raw(header_addr, BLOCK_HEADER_BYTES)?;
        let (lock, prefix_len) = Self::chain_info(chain)?;
        let _guard = lock.lock();
        allocator::deallocate(chain, prefix_len, addr)
    }

    /// Find the mapped address of the first thing ever allocated in the
    /// chain, given that it was allocated with the given size.
    ///
    /// The first allocation sits at a deterministic position right
    /// after the allocator's reserved space; it must still be live.
    ///
    /// # Errors
    /// `UnknownChain`; `Discontiguous` if `bytes` does not fit there
    /// contiguously.
    pub fn first_allocation(chain: ChainId, bytes: u64) -> Result<NonNull<u8>> {
        let (_, prefix_len) = Self::chain_info(chain)?;
        let addr = Self::translate(chain, prefix_len + FIRST_ALLOCATION_OFFSET, bytes)?;
        Ok(NonNull::new(addr as *mut u8).expect("mapped address is never null"))
    }

    /// Total length of the chain in bytes.
    ///
    /// # Errors
    /// `UnknownChain`.
    pub fn chain_len(chain: ChainId) -> Result<u64> {
        let ix = index().read();
        Ok(ix
            .chains
            .get(&chain)
            .ok_or(ChainError::UnknownChain { chain })?
            .total_len)
    }

    /// Render the chain's segment table and block structure.
    ///
    /// Diagnostics only. Not safe against concurrent writers to the
    /// chain.
    pub fn dump(chain: ChainId) -> Result<String> {
        use std::fmt::Write as _;

        let (segments, total_len, prefix_len) = {
            let ix = index().read();
            let meta = ix
                .chains
                .get(&chain)
                .ok_or(ChainError::UnknownChain { chain })?;
            let spans: Vec<(u64, usize, usize)> = ix
                .by_chain
                .get(&chain)
                .map(|spans| {
                    spans
                        .iter()
                        .map(|(&start, &base)| (start, base, ix.by_addr[&base].len))
                        .collect()
                })
                .unwrap_or_default();
            (spans, meta.total_len, meta.prefix_len)
        };

        let mut out = String::new();
        let _ = writeln!(out, "{chain}: {total_len} bytes, prefix {prefix_len}");
        for (start, base, len) in segments {
            let _ = writeln!(
                out,
                "  segment @ {base:#x}: positions {start}..{}",
                start + len as u64
            );
        }
        let free: std::collections::BTreeSet<u64> = allocator::free_blocks(chain, prefix_len)?
            .into_iter()
            .map(|(pos, _)| pos)
            .collect();
        for (pos, size) in allocator::physical_blocks(chain, prefix_len)? {
            let _ = writeln!(
                out,
                "  block @ {pos}: {size} bytes, {}",
                if free.contains(&pos) { "free" } else { "allocated" }
            );
        }
        Ok(out)
    }

    /// Translate a raw position to a raw address.
    pub(crate) fn translate(chain: ChainId, position: u64, len: u64) -> Result<usize> {
        index().read().address_of(chain, position, len)
    }

    /// Translate a raw address to its chain and raw position.
    pub(crate) fn locate_raw(addr: usize, len: u64) -> Result<(ChainId, u64)> {
        index().read().locate(addr, len)
    }

    /// Append `add` bytes to the chain as one fresh segment.
    ///
    /// Returns the chain position the new segment starts at (the old
    /// total length). Called with the chain's allocator mutex held;
    /// takes the index write lock, in that order only.
    pub(crate) fn extend_chain(chain: ChainId, add: u64) -> Result<u64> {
        let mut ix = index().write();
        let meta = ix
            .chains
            .get_mut(&chain)
            .ok_or(ChainError::UnknownChain { chain })?;
        let old_len = meta.total_len;
        let oom = |cause: String| ChainError::OutOfMemory {
            chain,
            requested: add,
            cause,
        };
        let mapping = match &meta.file {
            Some(file) => {
                file.set_len(old_len + add)
                    .map_err(|e| oom(e.to_string()))?;
                Mapping::file_backed(file, old_len, add as usize)
                    .map_err(|e| oom(map_cause(e)))?
            }
            None => Mapping::anonymous(add as usize).map_err(|e| oom(map_cause(e)))?,
        };
        meta.total_len = old_len + add;
        ix.register(LinkRecord::new(chain, old_len, mapping));
        tracing::debug!(%chain, old_len, grew_by = add, "extended chain");
        Ok(old_len)
    }

    fn chain_info(chain: ChainId) -> Result<(Arc<Mutex<()>>, u64)> {
        let ix = index().read();
        let meta = ix
            .chains
            .get(&chain)
            .ok_or(ChainError::UnknownChain { chain })?;
        Ok((meta.alloc_lock.clone(), meta.prefix_len))
    }

    fn check_prefix(prefix: &[u8]) -> Result<()> {
        if prefix.len() > MAX_PREFIX_SIZE {
            return Err(ChainError::BadFile {
                cause: format!(
                    "prefix of {} bytes exceeds the {MAX_PREFIX_SIZE}-byte maximum",
                    prefix.len()
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Seek, SeekFrom, Write};

    #[test]
    fn translation_round_trips() {
        let chain = Manager::create_chain(b"roundtrip").unwrap();
        for offset in [0u64, 9, 100, BASE_SIZE - 1] {
            let addr = Manager::address_of(chain, Position::new(offset), 1).unwrap();
            let (found, position) = Manager::position_of(addr, 1).unwrap();
            assert_eq!(found, chain);
            assert_eq!(position, Position::new(offset));
        }
        Manager::destroy_chain(chain).unwrap();
    }

    #[test]
    fn prefix_is_written_at_chain_start() {
        let chain = Manager::create_chain(b"HEADBYTES").unwrap();
        let addr = Manager::address_of(chain, Position::new(0), 9).unwrap();
        let bytes = unsafe { std::slice::from_raw_parts(addr.as_ptr(), 9) };
        assert_eq!(bytes, b"HEADBYTES");
        Manager::destroy_chain(chain).unwrap();
    }

    #[test]
    fn oversized_prefix_is_rejected() {
        assert!(matches!(
            Manager::create_chain(b"seventeen bytes!!"),
            Err(ChainError::BadFile { .. })
        ));
    }

    #[test]
    fn chain_of_unmapped_address_is_none() {
        let byte = 0u8;
        assert_eq!(Manager::chain_of(&byte), ChainId::NONE);
    }

    #[test]
    fn cross_chain_store_is_rejected() {
        let x = Manager::create_chain(b"x").unwrap();
        let y = Manager::create_chain(b"y").unwrap();
        let in_x = Manager::address_of(x, Position::new(100), 1).unwrap();
        let in_y = Manager::address_of(y, Position::new(100), 1).unwrap();

        assert!(matches!(
            Manager::position_in_same_chain(in_x, in_y),
            Err(ChainError::CrossChain { .. })
        ));
        // Within one chain it succeeds.
        assert_eq!(
            Manager::position_in_same_chain(in_x, in_x).unwrap(),
            Position::new(100)
        );

        Manager::destroy_chain(x).unwrap();
        Manager::destroy_chain(y).unwrap();
    }

    #[test]
    fn growth_preserves_earlier_bytes() {
        let chain = Manager::create_chain(b"").unwrap();
        let first = Manager::allocate_from(chain, 32).unwrap();
        let (_, first_pos) = Manager::position_of(first, 32).unwrap();
        for i in 0..32u8 {
            unsafe { *first.as_ptr().add(i as usize) = 0xAA + i }
        }

        // Force growth past the head segment.
        let _big = Manager::allocate_from(chain, 4096).unwrap();
        assert!(Manager::chain_len(chain).unwrap() > BASE_SIZE);

        // Re-resolve from the position: bytes unchanged.
        let again = Manager::address_of(chain, first_pos, 32).unwrap();
        for i in 0..32u8 {
            assert_eq!(unsafe { *again.as_ptr().add(i as usize) }, 0xAA + i);
        }
        Manager::destroy_chain(chain).unwrap();
    }

    #[test]
    fn segments_never_share_addresses() {
        let a = Manager::create_chain(b"").unwrap();
        let b = Manager::create_chain(b"").unwrap();
        let _ = Manager::allocate_from(a, 4096).unwrap();
        let _ = Manager::allocate_from(b, 8192).unwrap();

        let ix = index().read();
        let ranges: Vec<(usize, usize)> = ix
            .by_addr
            .values()
            .filter(|record| record.chain == a || record.chain == b)
            .map(|record| (record.base, record.base + record.len))
            .collect();
        drop(ix);
        for (i, &(start_a, end_a)) in ranges.iter().enumerate() {
            for &(start_b, end_b) in &ranges[i + 1..] {
                assert!(end_a <= start_b || end_b <= start_a);
            }
        }
        Manager::destroy_chain(a).unwrap();
        Manager::destroy_chain(b).unwrap();
    }

    #[test]
    fn file_backed_chain_round_trips_through_reopen() {
        let file = tempfile::tempfile().unwrap();
        let chain = Manager::create_chain_in(&file, b"FMT1").unwrap();
        let addr = Manager::allocate_from(chain, 16).unwrap();
        unsafe {
            ptr::copy_nonoverlapping(b"persisted please".as_ptr(), addr.as_ptr(), 16);
        }
        let (_, position) = Manager::position_of(addr, 16).unwrap();
        Manager::destroy_chain(chain).unwrap();

        // The caller's descriptor is untouched and the data is in the file.
        let chain = Manager::create_chain_in(&file, b"FMT1").unwrap();
        let addr = Manager::address_of(chain, position, 16).unwrap();
        let bytes = unsafe { std::slice::from_raw_parts(addr.as_ptr(), 16) };
        assert_eq!(bytes, b"persisted please");
        Manager::destroy_chain(chain).unwrap();
    }

    #[test]
    fn short_file_is_rejected() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"PREFIX plus a little").unwrap();
        assert!(matches!(
            Manager::create_chain_in(&file, b"PREFIX"),
            Err(ChainError::BadFile { .. })
        ));
    }

    #[test]
    fn garbage_file_is_rejected() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(&[0xEEu8; 512]).unwrap();
        assert!(matches!(
            Manager::create_chain_in(&file, b"GG"),
            Err(ChainError::BadFile { .. })
        ));
    }

    #[test]
    fn dissociated_copy_matches_and_detaches() {
        let source = Manager::create_chain(b"copyme").unwrap();
        let addr = Manager::allocate_from(source, 64).unwrap();
        unsafe {
            addr.as_ptr().write_bytes(0x5A, 64);
        }
        let (_, position) = Manager::position_of(addr, 64).unwrap();

        let copy = Manager::dissociated_chain(source).unwrap();
        assert_ne!(copy, source);
        assert_eq!(
            Manager::chain_len(copy).unwrap(),
            Manager::chain_len(source).unwrap()
        );

        // Same position resolves in both chains, to equal bytes.
        let copied = Manager::address_of(copy, position, 64).unwrap();
        let bytes = unsafe { std::slice::from_raw_parts(copied.as_ptr(), 64) };
        assert!(bytes.iter().all(|&b| b == 0x5A));

        // Writing the copy leaves the source alone.
        unsafe {
            copied.as_ptr().write_bytes(0x11, 64);
        }
        let original = unsafe { std::slice::from_raw_parts(addr.as_ptr(), 64) };
        assert!(original.iter().all(|&b| b == 0x5A));

        Manager::destroy_chain(source).unwrap();
        Manager::destroy_chain(copy).unwrap();
    }

    #[test]
    fn file_content_survives_via_associated_copy() {
        let mut file = tempfile::tempfile().unwrap();
        let source = Manager::create_chain(b"save").unwrap();
        let addr = Manager::allocate_from(source, 8).unwrap();
        unsafe {
            ptr::copy_nonoverlapping(b"CONTENTS".as_ptr(), addr.as_ptr(), 8);
        }

        let saved = Manager::associated_chain(source, &file).unwrap();
        Manager::destroy_chain(source).unwrap();
        Manager::destroy_chain(saved).unwrap();

        file.seek(SeekFrom::Start(0)).unwrap();
        let mut contents = Vec::new();
        file.read_to_end(&mut contents).unwrap();
        assert_eq!(&contents[..4], b"save");
        assert!(contents
            .windows(8)
            .any(|window| window == b"CONTENTS"));
    }

    #[test]
    fn dump_renders_segments_and_blocks() {
        let chain = Manager::create_chain(b"dumpme").unwrap();
        let _ = Manager::allocate_from(chain, 64).unwrap();
        let rendered = Manager::dump(chain).unwrap();
        assert!(rendered.contains("segment @"));
        assert!(rendered.contains("allocated"));
        assert!(rendered.contains("free"));
        Manager::destroy_chain(chain).unwrap();
    }
}
