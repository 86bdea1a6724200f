//! Chains of mapped memory segments and the in-chain allocator.
//!
//! A **chain** is a logical, append-extensible byte sequence with a
//! stable position space. It is composed of one or more **segments**,
//! each an independent memory mapping that may land at an arbitrary
//! base address. File-backed chains persist every modification and grow
//! their backing file on demand.
//!
//! # Chain head layout
//!
//! ```text
//! offset 0            prefix (caller-supplied, at most 16 bytes)
//! offset p            first_free position  (8B BE) \  allocator
//! offset p + 8        last_free  position  (8B BE) /  header
//! offset p + 16       block 0: prev position (8B BE) \
//! offset p + 24       block 0: next position (8B BE)  | block header
//! offset p + 32       block 0: size          (8B BE) /
//! offset p + 40       first allocatable byte
//! ...                 allocator-managed memory
//! ```
//!
//! All numeric fields are unsigned big-endian; the null position
//! sentinel is all ones. Because the allocator's bookkeeping lives
//! inside the chain itself, a snapshot of a file-backed chain is a
//! self-contained image: mapping it again reconnects everything.
//!
//! # Growth
//!
//! Appending bytes to a chain maps a *new* segment; existing segments
//! are never moved or unmapped before chain destruction. Positions
//! therefore stay valid across growth, while absolute addresses into
//! the chain must be re-resolved after any call that may grow it.

mod allocator;
mod index;
mod manager;
mod segment;

pub use manager::{Manager, BASE_SIZE, MAX_PREFIX_SIZE};
