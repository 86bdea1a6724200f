//! The relocatable intra-chain pointer.

use crate::chain::Manager;
use crate::codec;
use crate::error::{ChainError, Result};
use crate::types::Position;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;

/// A position-valued pointer that lives *inside* chain memory.
///
/// `ChainPtr<T>` stores the chain position of its target as a single
/// big-endian word, with all ones meaning null. Because positions are
/// invariant under remapping, a stored pointer resolves to the same
/// logical object after any number of unmap/remap or growth events,
/// even when the chain now lives at a different base address.
///
/// Resolution goes through the [`Manager`]: the pointer asks which
/// chain its own storage address belongs to, then translates the stored
/// position within that chain. Both the pointer and its target must
/// therefore live in the *same* chain; storing an address from another
/// chain fails with `CrossChain`.
///
/// An address obtained from [`load`](Self::load) is valid only until
/// the next operation that may grow the chain.
#[repr(C)]
pub struct ChainPtr<T> {
    /// Big-endian target position, or all ones for null.
    raw: [u8; 8],
    _marker: PhantomData<*const T>,
}

impl<T> ChainPtr<T> {
    /// Create a null pointer.
    #[must_use]
    pub const fn null() -> Self {
        Self {
            raw: [0xff; 8],
            _marker: PhantomData,
        }
    }

    /// Check if this pointer is null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.position().is_none()
    }

    /// Get the stored target position.
    #[must_use]
    pub fn position(&self) -> Position {
        Position::new(unsafe { codec::read_u64(self.raw.as_ptr()) })
    }

    /// Set the stored target position directly.
    pub fn set_position(&mut self, position: Position) {
        unsafe {
            codec::write_u64(self.raw.as_mut_ptr(), position.get());
        }
    }

    /// Point at `target`, or become null.
    ///
    /// `target` must be an address in the same chain this pointer's own
    /// storage lives in.
    ///
    /// # Errors
    /// `CrossChain` if `target` belongs to a different chain;
    /// `UnmappedAddress` if this pointer or the target is outside every
    /// chain.
    pub fn store(&mut self, target: Option<NonNull<T>>) -> Result<()> {
        match target {
            None => {
                self.set_position(Position::NONE);
                Ok(())
            }
            Some(target) => {
                let here = NonNull::from(&*self).cast::<u8>();
                let position = Manager::position_in_same_chain(here, target.cast())?;
                self.set_position(position);
                Ok(())
            }
        }
    }

    /// Resolve to the target's current address, or `None` if null.
    ///
    /// # Errors
    /// `UnmappedAddress` if this pointer's own storage is outside every
    /// chain; `Discontiguous` if the stored position is outside the
    /// chain.
    pub fn load(&self) -> Result<Option<NonNull<T>>> {
        let position = self.position();
        if position.is_none() {
            return Ok(None);
        }
        let here = NonNull::from(self).cast::<u8>();
        let addr = Manager::address_in_same_chain(here, position)?;
        Ok(Some(addr.cast()))
    }

    /// Resolve to the target's current address.
    ///
    /// # Errors
    /// `NullDereference` if the pointer is null, plus the errors of
    /// [`load`](Self::load).
    pub fn get(&self) -> Result<NonNull<T>> {
        self.load()?.ok_or(ChainError::NullDereference)
    }

    /// Resolve to the address `items` elements past the target.
    ///
    /// This is plain address arithmetic on the resolved pointer; the
    /// stored position is not changed.
    ///
    /// # Errors
    /// As [`get`](Self::get); `Discontiguous` when `items` elements of
    /// `T` past the target overflow the address space.
    pub fn offset(&self, items: usize) -> Result<NonNull<T>> {
        let base = self.get()?;
        items
            .checked_mul(mem::size_of::<T>())
            .and_then(|bytes| (base.as_ptr() as usize).checked_add(bytes))
            .and_then(|addr| NonNull::new(addr as *mut T))
            .ok_or_else(|| ChainError::Discontiguous {
                chain: Manager::chain_of(base.as_ptr().cast()),
                position: self.position(),
                length: (items as u64).saturating_mul(mem::size_of::<T>() as u64),
            })
    }
}

impl<T> Clone for ChainPtr<T> {
    fn clone(&self) -> Self {
        Self {
            raw: self.raw,
            _marker: PhantomData,
        }
    }
}

impl<T> Copy for ChainPtr<T> {}

impl<T> Default for ChainPtr<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> PartialEq for ChainPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for ChainPtr<T> {}

impl<T> fmt::Debug for ChainPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainPtr")
            .field("position", &self.position())
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

/// Marker for types whose bytes may live inside chain memory.
///
/// # Safety
/// Implementors must guarantee:
/// - `#[repr(C)]` (or an otherwise stable layout);
/// - no `Drop` glue anywhere in the type (chain teardown never runs
///   destructors);
/// - no fields that own memory outside the chain (no `Box`, `Vec`,
///   `String`, host pointers, ...);
/// - the value stays meaningful when its bytes are copied to another
///   address, as happens on save, load and dissociate.
///
/// [`ChainPtr`] satisfies all of these and is the only sanctioned way
/// to hold a reference from one chain-resident value to another.
pub unsafe trait ChainSafe: Sized {}

unsafe impl<T> ChainSafe for ChainPtr<T> {}
