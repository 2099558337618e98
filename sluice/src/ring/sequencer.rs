//! Single-producer sequencer
//!
//! Owns the producer cursor and hands out contiguous ranges of slots to the
//! one publishing thread. The claim-side fields need no cross-thread
//! synchronization; the cursor is the sole handshake with consumers and its
//! release on publish pairs with their acquires.

use std::sync::atomic::{ AtomicI64, Ordering };
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::RwLock;

use crate::constants::INITIAL_CURSOR_VALUE;
use crate::error::{ Result, SluiceError };
use crate::insights;
use crate::metrics::METRICS;
use crate::ring::barrier::SequenceBarrier;
use crate::ring::sequence::{ minimum_sequence, Sequence };
use crate::ring::wait_strategy::WaitStrategy;
use crate::ring::RingConfig;

/// Resolves the highest contiguously published sequence within a claimed
/// range. The single-producer sequencer publishes contiguously, so its
/// resolution is the identity; a multi-producer variant would consult a
/// per-slot availability table here.
pub trait SequencePublication: Send + Sync {
    fn highest_published_sequence(&self, lo: i64, available: i64) -> i64;
}

/// Witness of the single-producer contiguity invariant, handed to barriers.
pub(crate) struct SingleProducerPublication;

impl SequencePublication for SingleProducerPublication {
    fn highest_published_sequence(&self, _lo: i64, available: i64) -> i64 {
        available
    }
}

/// Producer-private claim state, padded onto its own cache line.
///
/// Both fields are written only by the publishing thread; they are atomics
/// with relaxed ordering solely so the sequencer can be shared behind `Arc`.
#[repr(align(128))]
struct ClaimPad {
    next_value: AtomicI64,
    cached_gating: AtomicI64,
    _padding: [u8; 112], // 128 - 2 * 8 bytes
}

impl ClaimPad {
    fn new() -> Self {
        Self {
            next_value: AtomicI64::new(INITIAL_CURSOR_VALUE),
            cached_gating: AtomicI64::new(INITIAL_CURSOR_VALUE),
            _padding: [0; 112],
        }
    }
}

/// Coordinator for claiming and publishing sequences with a single producer.
///
/// Not safe for concurrent claiming: exactly one thread may call the
/// claim-side operations (`next*`, `try_next*`, `claim`) at a time.
pub struct SingleProducerSequencer {
    buffer_size: usize,
    cursor: Arc<Sequence>,
    wait_strategy: Arc<dyn WaitStrategy>,
    gating_sequences: RwLock<Vec<Arc<Sequence>>>,
    pad: ClaimPad,
}

impl SingleProducerSequencer {
    /// Create a sequencer over `buffer_size` slots with the given wait
    /// strategy. Fails unless `buffer_size` is a nonzero power of two.
    pub fn new(buffer_size: usize, wait_strategy: Arc<dyn WaitStrategy>) -> Result<Self> {
        let config = RingConfig::new(buffer_size)?;

        Ok(Self {
            buffer_size: config.size,
            cursor: Arc::new(Sequence::default()),
            wait_strategy,
            gating_sequences: RwLock::new(Vec::new()),
            pad: ClaimPad::new(),
        })
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// The producer cursor: highest sequence made available to consumers.
    pub fn cursor(&self) -> Arc<Sequence> {
        self.cursor.clone()
    }

    fn minimum_gating_sequence(&self, fallback: i64) -> i64 {
        minimum_sequence(&self.gating_sequences.read(), fallback)
    }

    /// Claim the next sequence.
    pub fn next(&self) -> Result<i64> {
        self.next_n(1)
    }

    /// Claim the next `n` contiguous sequences, parking until the slowest
    /// gating consumer has moved past the wrap point.
    pub fn next_n(&self, n: i64) -> Result<i64> {
        if n < 1 {
            return Err(SluiceError::invalid_argument("n must be > 0"));
        }

        let next_value = self.pad.next_value.load(Ordering::Relaxed);
        let next_sequence = next_value + n;
        let wrap_point = next_sequence - (self.buffer_size as i64);
        let cached_gating_sequence = self.pad.cached_gating.load(Ordering::Relaxed);

        // cached_gating > next_value means the cache was poisoned by claim();
        // both conditions force a fresh scan of the gating set.
        if wrap_point > cached_gating_sequence || cached_gating_sequence > next_value {
            let mut min_sequence = self.minimum_gating_sequence(next_value);
            if wrap_point > min_sequence {
                insights::record_capacity_stall(wrap_point);
                METRICS.record_capacity_stall();
                while wrap_point > min_sequence {
                    thread::sleep(Duration::from_nanos(1));
                    min_sequence = self.minimum_gating_sequence(next_value);
                }
            }
            self.pad.cached_gating.store(min_sequence, Ordering::Relaxed);
        }

        self.pad.next_value.store(next_sequence, Ordering::Relaxed);
        Ok(next_sequence)
    }

    /// Non-blocking claim of the next sequence.
    pub fn try_next(&self) -> Result<i64> {
        self.try_next_n(1)
    }

    /// Non-blocking claim of `n` sequences; fails with
    /// [`SluiceError::InsufficientCapacity`] when the ring cannot take them.
    pub fn try_next_n(&self, n: i64) -> Result<i64> {
        if n < 1 {
            return Err(SluiceError::invalid_argument("n must be > 0"));
        }

        if !self.has_available_capacity(n) {
            return Err(SluiceError::InsufficientCapacity);
        }

        let next_sequence = self.pad.next_value.load(Ordering::Relaxed) + n;
        self.pad.next_value.store(next_sequence, Ordering::Relaxed);
        Ok(next_sequence)
    }

    /// Whether `required_capacity` slots can be claimed without wrapping
    /// over a gating consumer. Refreshes the cached gating value on a miss.
    pub fn has_available_capacity(&self, required_capacity: i64) -> bool {
        let next_value = self.pad.next_value.load(Ordering::Relaxed);
        let wrap_point = next_value + required_capacity - (self.buffer_size as i64);
        let cached_gating_sequence = self.pad.cached_gating.load(Ordering::Relaxed);

        if wrap_point > cached_gating_sequence || cached_gating_sequence > next_value {
            let min_sequence = self.minimum_gating_sequence(next_value);
            self.pad.cached_gating.store(min_sequence, Ordering::Relaxed);

            if wrap_point > min_sequence {
                return false;
            }
        }

        true
    }

    /// Slots still claimable before the producer would catch the slowest
    /// gating consumer.
    pub fn remaining_capacity(&self) -> i64 {
        let next_value = self.pad.next_value.load(Ordering::Relaxed);
        let consumed = self.minimum_gating_sequence(next_value);
        (self.buffer_size as i64) - (next_value - consumed)
    }

    /// Publish `sequence`: release-store into the cursor, then wake any
    /// blocked waiters.
    pub fn publish(&self, sequence: i64) {
        self.cursor.set(sequence);
        METRICS.record_publish();
        self.wait_strategy.signal_all_when_blocking();
    }

    /// Publish a claimed range. Single-producer publication is contiguous,
    /// so only the upper bound matters.
    pub fn publish_range(&self, _lo: i64, hi: i64) {
        self.publish(hi);
    }

    pub fn is_available(&self, sequence: i64) -> bool {
        sequence <= self.cursor.get()
    }

    /// Highest sequence in `[lo, available]` that is safe to consume. The
    /// single-producer invariant guarantees contiguous publication, so the
    /// available value passes through unchanged.
    pub fn highest_published_sequence(&self, _lo: i64, available: i64) -> i64 {
        available
    }

    /// Set the claim position directly. Initialization only; must not race
    /// normal claiming.
    pub fn claim(&self, sequence: i64) {
        self.pad.next_value.store(sequence, Ordering::Relaxed);
    }

    /// Register consumer sequences the producer must not overrun.
    pub fn add_gating_sequences(&self, sequences: &[Arc<Sequence>]) {
        let mut gating = self.gating_sequences.write();
        gating.extend(sequences.iter().cloned());
    }

    /// Remove a gating sequence; returns whether it was present.
    pub fn remove_gating_sequence(&self, sequence: &Arc<Sequence>) -> bool {
        let mut gating = self.gating_sequences.write();
        let before = gating.len();
        gating.retain(|s| !Arc::ptr_eq(s, sequence));
        gating.len() != before
    }

    /// Create a barrier gating on the cursor and the given upstream
    /// consumer sequences.
    pub fn new_barrier(&self, dependents: Vec<Arc<Sequence>>) -> SequenceBarrier {
        SequenceBarrier::new(
            Arc::new(SingleProducerPublication),
            self.wait_strategy.clone(),
            self.cursor.clone(),
            dependents
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::wait_strategy::BusySpinWaitStrategy;

    fn sequencer(size: usize) -> SingleProducerSequencer {
        SingleProducerSequencer::new(size, Arc::new(BusySpinWaitStrategy::new())).unwrap()
    }

    #[test]
    fn test_rejects_non_power_of_two() {
        let strategy: Arc<dyn WaitStrategy> = Arc::new(BusySpinWaitStrategy::new());
        assert!(SingleProducerSequencer::new(0, strategy.clone()).is_err());
        assert!(SingleProducerSequencer::new(24, strategy.clone()).is_err());
        assert!(SingleProducerSequencer::new(8, strategy).is_ok());
    }

    #[test]
    fn test_next_claims_contiguously() {
        let seq = sequencer(8);
        assert_eq!(seq.next().unwrap(), 0);
        assert_eq!(seq.next().unwrap(), 1);
        assert_eq!(seq.next_n(3).unwrap(), 4);
    }

    #[test]
    fn test_next_rejects_non_positive() {
        let seq = sequencer(8);
        assert!(matches!(seq.next_n(0), Err(SluiceError::InvalidArgument { .. })));
        assert!(matches!(seq.try_next_n(-1), Err(SluiceError::InvalidArgument { .. })));
    }

    #[test]
    fn test_try_next_fails_when_full() {
        let seq = sequencer(4);
        let gate = Arc::new(Sequence::default());
        seq.add_gating_sequences(&[gate.clone()]);

        for expected in 0..4 {
            assert_eq!(seq.try_next().unwrap(), expected);
        }
        assert!(matches!(seq.try_next(), Err(SluiceError::InsufficientCapacity)));

        // Consumer progress frees a slot.
        gate.set(0);
        assert_eq!(seq.try_next().unwrap(), 4);
    }

    #[test]
    fn test_has_available_capacity_round_trip() {
        let seq = sequencer(4);
        let gate = Arc::new(Sequence::default());
        seq.add_gating_sequences(&[gate]);

        assert!(seq.has_available_capacity(4));
        assert!(!seq.has_available_capacity(5));
        assert_eq!(seq.try_next_n(4).unwrap(), 3);
        assert!(!seq.has_available_capacity(1));
    }

    #[test]
    fn test_remaining_capacity() {
        let seq = sequencer(8);
        let gate = Arc::new(Sequence::default());
        seq.add_gating_sequences(&[gate.clone()]);

        assert_eq!(seq.remaining_capacity(), 8);
        seq.try_next_n(3).unwrap();
        assert_eq!(seq.remaining_capacity(), 5);
        gate.set(2);
        assert_eq!(seq.remaining_capacity(), 8);
    }

    #[test]
    fn test_publish_is_idempotent() {
        let seq = sequencer(8);
        seq.next().unwrap();
        seq.publish(0);
        seq.publish(0);
        assert_eq!(seq.cursor().get(), 0);
        assert!(seq.is_available(0));
        assert!(!seq.is_available(1));
    }

    #[test]
    fn test_publish_range_publishes_upper_bound() {
        let seq = sequencer(8);
        seq.next_n(4).unwrap();
        seq.publish_range(0, 3);
        assert_eq!(seq.cursor().get(), 3);
        assert_eq!(seq.highest_published_sequence(0, 3), 3);
    }

    #[test]
    fn test_claim_poisons_cache_and_refreshes() {
        let seq = sequencer(8);
        let gate = Arc::new(Sequence::new(20));
        seq.add_gating_sequences(&[gate]);

        // claim() moves next_value without touching the cached gating value;
        // the staleness guard forces a rescan on the next claim.
        seq.claim(20);
        assert_eq!(seq.next().unwrap(), 21);
    }

    #[test]
    fn test_remove_gating_sequence() {
        let seq = sequencer(8);
        let gate = Arc::new(Sequence::default());
        seq.add_gating_sequences(&[gate.clone()]);
        assert!(seq.remove_gating_sequence(&gate));
        assert!(!seq.remove_gating_sequence(&gate));

        // With no gating sequences the producer gates on its own progress.
        for expected in 0..16 {
            assert_eq!(seq.try_next().unwrap(), expected);
        }
    }
}
