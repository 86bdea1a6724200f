//! The external owning handle for a chain and its root object.

use crate::chain::Manager;
use crate::error::{ChainError, Result};
use crate::types::{ChainId, ChainSafe};
use std::fs::File;
use std::marker::PhantomData;
use std::mem;
use std::ptr;

/// Owning handle for a chain with a `T` at its head.
///
/// The handle itself lives *outside* any chain; it is the bridge
/// between normally-allocated code and chain-resident data. `T` is
/// placed at the chain's first allocation, whose position is
/// deterministic, which is how [`load`](Self::load) rediscovers the
/// root without storing anything outside the chain.
///
/// The handle is moveable but not copyable and owns at most one chain;
/// dropping it destroys the chain. For a file-backed chain the file
/// keeps its bytes, so a later [`load`](Self::load) resurrects the
/// value.
///
/// References obtained from [`get`](Self::get)/[`get_mut`](Self::get_mut)
/// are valid only until the next operation that may grow the chain;
/// re-acquire them afterwards.
pub struct RootHandle<T: ChainSafe> {
    chain: ChainId,
    _marker: PhantomData<T>,
}

impl<T: ChainSafe> RootHandle<T> {
    /// Create a null handle owning no chain.
    #[must_use]
    pub fn new() -> Self {
        Self {
            chain: ChainId::NONE,
            _marker: PhantomData,
        }
    }

    /// Create a new anonymous chain, preceded by the given prefix, and
    /// move `value` in as its root.
    ///
    /// # Errors
    /// `BadFile` for an oversized prefix; `Map` if the chain cannot be
    /// created.
    pub fn construct(prefix: &[u8], value: T) -> Result<Self> {
        let chain = Manager::create_chain(prefix)?;
        match Manager::allocate_from(chain, mem::size_of::<T>() as u64) {
            Ok(addr) => {
                unsafe {
                    ptr::write(addr.as_ptr().cast::<T>(), value);
                }
                Ok(Self {
                    chain,
                    _marker: PhantomData,
                })
            }
            Err(error) => {
                let _ = Manager::destroy_chain(chain);
                Err(error)
            }
        }
    }

    /// Adopt the `T` saved to `file` by a previous
    /// [`save`](Self::save) (or written there by a file-backed
    /// construct-and-drop).
    ///
    /// No constructor runs: the file must already hold a valid `T`
    /// image at the first-allocation position.
    ///
    /// # Errors
    /// `BadFile` if the file cannot hold a chain with this prefix;
    /// `Map` on mapping failures.
    pub fn load(file: &File, prefix: &[u8]) -> Result<Self> {
        let chain = Manager::create_chain_in(file, prefix)?;
        Ok(Self {
            chain,
            _marker: PhantomData,
        })
    }

    /// Move the root and all associated memory into the given file.
    ///
    /// The chain is copied into a file-backed chain, the old chain is
    /// destroyed and the new one adopted; stored positions stay valid.
    ///
    /// # Errors
    /// `NullDereference` on a null handle; `Map` on copy failures.
    pub fn save(&mut self, file: &File) -> Result<()> {
        if self.chain.is_none() {
            return Err(ChainError::NullDereference);
        }
        let old_chain = self.chain;
        // Adopt the copy first so it is always owned by the handle.
        self.chain = Manager::associated_chain(old_chain, file)?;
        if let Err(error) = Manager::destroy_chain(old_chain) {
            tracing::warn!(chain = %old_chain, %error, "destroying replaced chain failed");
        }
        Ok(())
    }

    /// Break any write-back association with a backing file by moving
    /// the chain to anonymous memory.
    ///
    /// # Errors
    /// `NullDereference` on a null handle; `Map` on copy failures.
    pub fn dissociate(&mut self) -> Result<()> {
        if self.chain.is_none() {
            return Err(ChainError::NullDereference);
        }
        let old_chain = self.chain;
        // Adopt the copy first so it is always owned by the handle.
        self.chain = Manager::dissociated_chain(old_chain)?;
        if let Err(error) = Manager::destroy_chain(old_chain) {
            tracing::warn!(chain = %old_chain, %error, "destroying replaced chain failed");
        }
        Ok(())
    }

    /// Free any associated memory and become null.
    pub fn reset(&mut self) {
        if !self.chain.is_none() {
            if let Err(error) = Manager::destroy_chain(self.chain) {
                tracing::warn!(chain = %self.chain, %error, "destroying chain on reset failed");
            }
            self.chain = ChainId::NONE;
        }
    }

    /// Borrow the root value.
    ///
    /// # Errors
    /// `NullDereference` on a null handle; `Discontiguous` if the chain
    /// cannot hold a `T` at the root position.
    pub fn get(&self) -> Result<&T> {
        let addr = Manager::first_allocation(self.chain_or_null()?, mem::size_of::<T>() as u64)?;
        Ok(unsafe { &*addr.as_ptr().cast::<T>() })
    }

    /// Borrow the root value mutably.
    ///
    /// # Errors
    /// As [`get`](Self::get).
    pub fn get_mut(&mut self) -> Result<&mut T> {
        let addr = Manager::first_allocation(self.chain_or_null()?, mem::size_of::<T>() as u64)?;
        Ok(unsafe { &mut *addr.as_ptr().cast::<T>() })
    }

    /// Check if the handle owns no chain.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.chain.is_none()
    }

    /// The id of the owned chain, or [`ChainId::NONE`].
    #[must_use]
    pub fn chain_id(&self) -> ChainId {
        self.chain
    }

    fn chain_or_null(&self) -> Result<ChainId> {
        if self.chain.is_none() {
            Err(ChainError::NullDereference)
        } else {
            Ok(self.chain)
        }
    }
}

impl<T: ChainSafe> Default for RootHandle<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ChainSafe> Drop for RootHandle<T> {
    fn drop(&mut self) {
        self.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChainPtr;

    #[repr(C)]
    struct Counter {
        hits: u64,
        spare: ChainPtr<u64>,
    }

    unsafe impl ChainSafe for Counter {}

    #[test]
    fn construct_and_read_back() {
        let mut handle = RootHandle::construct(
            b"cnt",
            Counter {
                hits: 7,
                spare: ChainPtr::null(),
            },
        )
        .unwrap();
        assert!(!handle.is_null());
        assert_eq!(handle.get().unwrap().hits, 7);

        handle.get_mut().unwrap().hits = 8;
        assert_eq!(handle.get().unwrap().hits, 8);
    }

    #[test]
    fn root_sits_at_deterministic_offset() {
        let handle = RootHandle::construct(
            b"",
            Counter {
                hits: 1,
                spare: ChainPtr::null(),
            },
        )
        .unwrap();
        let root = handle.get().unwrap() as *const Counter as *mut u8;
        let root = std::ptr::NonNull::new(root).unwrap();
        let (_, position) = Manager::position_of(root, 1).unwrap();
        // Empty prefix: allocator header (16) + block header (24).
        assert_eq!(position.get(), 40);
    }

    #[test]
    fn null_handle_rejects_everything() {
        let mut handle: RootHandle<Counter> = RootHandle::new();
        assert!(handle.is_null());
        assert!(matches!(handle.get(), Err(ChainError::NullDereference)));
        assert!(matches!(
            handle.dissociate(),
            Err(ChainError::NullDereference)
        ));
        let file = tempfile::tempfile().unwrap();
        assert!(matches!(
            handle.save(&file),
            Err(ChainError::NullDereference)
        ));
    }

    #[test]
    fn reset_releases_the_chain() {
        let mut handle = RootHandle::construct(
            b"",
            Counter {
                hits: 3,
                spare: ChainPtr::null(),
            },
        )
        .unwrap();
        let chain = handle.chain_id();
        handle.reset();
        assert!(handle.is_null());
        assert!(matches!(
            Manager::chain_len(chain),
            Err(ChainError::UnknownChain { .. })
        ));
    }

    #[test]
    fn save_then_load_round_trips() {
        let file = tempfile::tempfile().unwrap();
        {
            let mut handle = RootHandle::construct(
                b"vers",
                Counter {
                    hits: 99,
                    spare: ChainPtr::null(),
                },
            )
            .unwrap();
            handle.save(&file).unwrap();
            assert_eq!(handle.get().unwrap().hits, 99);
        }
        let handle: RootHandle<Counter> = RootHandle::load(&file, b"vers").unwrap();
        assert_eq!(handle.get().unwrap().hits, 99);
    }

    #[test]
    fn dissociate_survives_file_truncation() {
        let file = tempfile::tempfile().unwrap();
        let mut handle = RootHandle::construct(
            b"",
            Counter {
                hits: 1234,
                spare: ChainPtr::null(),
            },
        )
        .unwrap();
        handle.save(&file).unwrap();

        handle.dissociate().unwrap();
        file.set_len(0).unwrap();
        drop(file);

        assert_eq!(handle.get().unwrap().hits, 1234);
    }
}
