//! Ring slot storage
//!
//! A fixed array of slots indexed by sequence with a power-of-two mask.
//! Slots are mutated in place; the sequence protocol is the only access
//! discipline, so the raw accessors are unsafe with documented contracts.

use std::cell::UnsafeCell;

use crate::error::Result;
use crate::ring::RingConfig;

/// Index-to-slot accessor used by processors to fetch published events.
pub trait DataProvider<E>: Send + Sync {
    /// Borrow the slot at `sequence`.
    ///
    /// Callers must only pass sequences the barrier has reported available;
    /// the cursor acquire that reported them publishes the slot contents.
    fn get(&self, sequence: i64) -> &E;
}

/// Fixed-capacity circular slot array.
pub struct RingBuffer<E> {
    slots: Box<[UnsafeCell<E>]>,
    mask: usize,
}

// Slots are shared mutable state; exclusivity is enforced by the sequence
// protocol (claim/publish on the producer side, barrier gating on the
// consumer side), not by the type system.
unsafe impl<E: Send> Send for RingBuffer<E> {}
unsafe impl<E: Send> Sync for RingBuffer<E> {}

impl<E> RingBuffer<E> {
    /// Create a ring of `size` default-initialized slots. Fails unless
    /// `size` is a nonzero power of two.
    pub fn new(size: usize) -> Result<Self> where E: Default {
        Self::with_factory(size, |_| E::default())
    }

    /// Create a ring whose slots are produced by `factory(index)`.
    pub fn with_factory(size: usize, factory: impl FnMut(usize) -> E) -> Result<Self> {
        let config = RingConfig::new(size)?;

        let slots = (0..config.size)
            .map(factory)
            .map(UnsafeCell::new)
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Ok(Self {
            slots,
            mask: config.size - 1,
        })
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    fn index(&self, sequence: i64) -> usize {
        (sequence as usize) & self.mask
    }

    /// Mutable access to the slot at `sequence` for the producer.
    ///
    /// # Safety
    /// - `sequence` must have been claimed from the sequencer and not yet
    ///   published, so no consumer can be reading the slot
    /// - only the single producer thread may hold this borrow
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn slot_mut(&self, sequence: i64) -> &mut E {
        &mut *self.slots[self.index(sequence)].get()
    }
}

impl<E: Send> DataProvider<E> for RingBuffer<E> {
    #[inline]
    fn get(&self, sequence: i64) -> &E {
        unsafe { &*self.slots[self.index(sequence)].get() }
    }
}
