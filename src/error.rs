//! Error types for chainmem.
//!
//! All errors carry the identifiers needed to locate the failure (chain
//! id, position, address). Every error has a stable code retrievable
//! via [`ChainError::code`].

use crate::types::{ChainId, Position};
use thiserror::Error;

/// The main error type for chain operations.
#[derive(Error, Debug)]
pub enum ChainError {
    /// A null chain pointer or null root handle was followed.
    #[error("E001: Null dereference")]
    NullDereference,

    /// A chain pointer was assigned an address from a different chain.
    #[error("E002: Cross-chain store: pointer lives in {ptr_chain}, target in {target_chain}")]
    CrossChain {
        /// The chain the pointer itself lives in.
        ptr_chain: ChainId,
        /// The chain the target address belongs to.
        target_chain: ChainId,
    },

    /// A contiguity-checked translation spans a segment boundary, or the
    /// requested position lies outside every segment of the chain.
    #[error("E003: Discontiguous span of {length} bytes at {position} in {chain}")]
    Discontiguous {
        /// The chain being translated.
        chain: ChainId,
        /// The first position of the requested span.
        position: Position,
        /// The requested span length in bytes.
        length: u64,
    },

    /// Chain growth failed. The allocator state is unchanged and the
    /// calling operation has had no effect.
    #[error("E004: Out of memory growing {chain} by {requested} bytes: {cause}")]
    OutOfMemory {
        /// The chain that could not grow.
        chain: ChainId,
        /// Number of bytes the growth attempted to add.
        requested: u64,
        /// Reason the mapping or file extension failed.
        cause: String,
    },

    /// A free-list invariant violation was detected. Fatal; the chain
    /// must be treated as poisoned.
    #[error("E005: Corrupt free list in {chain}: {detail}")]
    CorruptFreeList {
        /// The chain whose free list is corrupt.
        chain: ChainId,
        /// Description of the violated invariant.
        detail: String,
    },

    /// A block already on the free list was deallocated again. Fatal.
    #[error("E006: Double free of block at {position} in {chain}")]
    DoubleFree {
        /// The chain containing the block.
        chain: ChainId,
        /// The position of the block header.
        position: Position,
    },

    /// A backing file is too short for its stated prefix or holds an
    /// unrecognizable allocator header.
    #[error("E007: Bad backing file: {cause}")]
    BadFile {
        /// Reason the file is unusable.
        cause: String,
    },

    /// An address that belongs to no mapped segment was translated.
    #[error("E008: Address {address:#x} is outside every chain")]
    UnmappedAddress {
        /// The offending address.
        address: usize,
    },

    /// An operation named a chain id that is not registered.
    #[error("E009: Unknown chain {chain}")]
    UnknownChain {
        /// The unrecognized chain id.
        chain: ChainId,
    },

    /// A mapping or file operation failed during chain creation or copy.
    #[error("E010: Mapping failed: {cause}")]
    Map {
        /// The underlying mmap/ftruncate failure.
        cause: String,
    },
}

impl ChainError {
    /// Get the stable error code (e.g. "E004").
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NullDereference => "E001",
            Self::CrossChain { .. } => "E002",
            Self::Discontiguous { .. } => "E003",
            Self::OutOfMemory { .. } => "E004",
            Self::CorruptFreeList { .. } => "E005",
            Self::DoubleFree { .. } => "E006",
            Self::BadFile { .. } => "E007",
            Self::UnmappedAddress { .. } => "E008",
            Self::UnknownChain { .. } => "E009",
            Self::Map { .. } => "E010",
        }
    }

    /// Check if this error poisons its chain.
    ///
    /// A poisoned chain has violated an internal invariant; further use
    /// is undefined and the process should abort or quarantine it.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::CorruptFreeList { .. } | Self::DoubleFree { .. })
    }
}

/// Result type alias using [`ChainError`].
pub type Result<T> = std::result::Result<T, ChainError>;
