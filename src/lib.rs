//! Memory-mapped allocation substrate.
//!
//! This crate lets rich data structures live inside a file-backed (or
//! anonymous) memory region and survive unmap/remap cycles.
//!
//! # Key components
//!
//! - **[`Manager`]**: owns *chains* of mapped memory *segments*; a
//!   file-backed chain persists every modification and grows its file
//!   on demand.
//! - **[`ChainPtr`]**: a position-valued pointer stored inside chain
//!   memory; it survives the chain being remapped at a different base
//!   address, because positions are invariant under remapping.
//! - The in-chain **allocator**: a free-list allocator whose
//!   bookkeeping lives inside the chain, so a snapshot of the backing
//!   file is a self-contained image.
//! - **[`RootHandle`]**: an external handle owning a chain plus a root
//!   value at its head, with construct/load/save/dissociate.
//!
//! # Example
//!
//! ```ignore
//! use chainmem::prelude::*;
//!
//! #[repr(C)]
//! struct Doc { length: u64, body: ChainPtr<u8> }
//! unsafe impl ChainSafe for Doc {}
//!
//! // Build a document in anonymous mapped memory.
//! let mut handle = RootHandle::construct(b"DOC1", Doc {
//!     length: 0,
//!     body: ChainPtr::null(),
//! })?;
//!
//! // Give it a heap... of mapped bytes, allocated from its own chain.
//! let body = Manager::allocate_from(handle.chain_id(), 4096)?;
//! handle.get_mut()?.body.store(Some(body.cast()))?;
//!
//! // Persist everything and come back later.
//! handle.save(&file)?;
//! drop(handle);
//! let handle: RootHandle<Doc> = RootHandle::load(&file, b"DOC1")?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chain;
pub mod codec;
pub mod error;
pub mod prelude;
pub mod root;
pub mod types;

pub use chain::{Manager, BASE_SIZE, MAX_PREFIX_SIZE};
pub use error::{ChainError, Result};
pub use root::RootHandle;
pub use types::{ChainId, ChainPtr, ChainSafe, Position};
