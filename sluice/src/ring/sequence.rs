//! Padded monotonic sequence counters.
//!
//! A `Sequence` names a logical position in the event stream. Producers and
//! consumers publish their progress through them, so each one is padded to
//! its own cache line to prevent false sharing with neighbouring allocations.

use std::sync::atomic::{ AtomicI64, Ordering };
use std::sync::Arc;

use crate::constants::INITIAL_CURSOR_VALUE;

/// Cache-line padded monotonic counter.
///
/// Padded to 128 bytes so two sequences never share a line even on hardware
/// that prefetches cache-line pairs.
#[repr(align(128))]
pub struct Sequence {
    value: AtomicI64,
    _padding: [u8; 120], // 128 - 8 bytes for AtomicI64
}

impl Sequence {
    pub fn new(initial: i64) -> Self {
        Self {
            value: AtomicI64::new(initial),
            _padding: [0; 120],
        }
    }

    /// Current value. Acquire: pairs with the release in `set` so slot
    /// contents written before a publish are visible to the reader.
    #[inline]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    /// Release-store a new value.
    #[inline]
    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Release);
    }

    /// Sequentially consistent store, for the rare sites that need a full
    /// ordering with surrounding operations.
    #[inline]
    pub fn set_volatile(&self, value: i64) {
        self.value.store(value, Ordering::SeqCst);
    }

    /// Compare-and-set; returns whether the exchange happened.
    #[inline]
    pub fn compare_and_set(&self, expected: i64, new: i64) -> bool {
        self.value
            .compare_exchange(expected, new, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[inline]
    pub fn increment_and_get(&self) -> i64 {
        self.add_and_get(1)
    }

    #[inline]
    pub fn add_and_get(&self, increment: i64) -> i64 {
        self.value.fetch_add(increment, Ordering::AcqRel) + increment
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new(INITIAL_CURSOR_VALUE)
    }
}

impl std::fmt::Debug for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequence").field("value", &self.get()).finish()
    }
}

/// Minimum over a set of sequences, with `fallback` for an empty set.
///
/// The producer passes its own next value as the fallback so an
/// unconstrained sequencer never stalls.
pub fn minimum_sequence(sequences: &[Arc<Sequence>], fallback: i64) -> i64 {
    sequences
        .iter()
        .map(|s| s.get())
        .min()
        .unwrap_or(fallback)
}

/// Fixed group of sequences observed as the minimum of its members.
pub struct SequenceGroup {
    members: Box<[Arc<Sequence>]>,
}

impl SequenceGroup {
    pub fn new(members: Vec<Arc<Sequence>>) -> Self {
        Self { members: members.into_boxed_slice() }
    }

    /// Minimum of the member sequences. Empty groups report `i64::MAX` so
    /// they never gate anything.
    pub fn minimum(&self) -> i64 {
        minimum_sequence(&self.members, i64::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// The view a waiting consumer gates on: either the producer cursor
/// directly, or the minimum of a fixed group of upstream sequences.
pub enum DependentSequences {
    Cursor(Arc<Sequence>),
    Group(SequenceGroup),
}

impl DependentSequences {
    /// Build the view for a barrier: the cursor when there are no upstream
    /// dependents, otherwise the fixed group.
    pub fn new(cursor: Arc<Sequence>, dependents: Vec<Arc<Sequence>>) -> Self {
        if dependents.is_empty() {
            Self::Cursor(cursor)
        } else {
            Self::Group(SequenceGroup::new(dependents))
        }
    }

    #[inline]
    pub fn value(&self) -> i64 {
        match self {
            Self::Cursor(cursor) => cursor.get(),
            Self::Group(group) => group.minimum(),
        }
    }
}
