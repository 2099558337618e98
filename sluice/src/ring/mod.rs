//! Sequenced ring coordination (LMAX Disruptor pattern).
//!
//! - `Sequence` - padded monotonic counter
//! - `SingleProducerSequencer` - claim/publish coordinator
//! - `SequenceBarrier` - gates consumers on the cursor and upstream sequences
//! - `RingBuffer<E>` - fixed slot storage
//! - `BatchEventProcessor` - drains available batches through an `EventHandler`

pub mod sequence;
pub mod wait_strategy;
pub mod barrier;
pub mod sequencer;
pub mod ring_buffer;
pub mod processor;

pub use sequence::{ minimum_sequence, DependentSequences, Sequence, SequenceGroup };
pub use wait_strategy::{
    BlockingWaitStrategy,
    BusySpinWaitStrategy,
    TimeoutBlockingWaitStrategy,
    WaitStrategy,
    YieldingWaitStrategy,
};
pub use barrier::SequenceBarrier;
pub use sequencer::{ SequencePublication, SingleProducerSequencer };
pub use ring_buffer::{ DataProvider, RingBuffer };
pub use processor::{
    BatchEventProcessor,
    EventHandler,
    ExceptionHandler,
    RecordingExceptionHandler,
};

use crate::constants::DEFAULT_RING_SIZE;
use crate::error::{ Result, SluiceError };

/// Validated ring geometry.
#[derive(Debug, Clone)]
pub struct RingConfig {
    /// Number of slots (must be power of 2)
    pub size: usize,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self { size: DEFAULT_RING_SIZE }
    }
}

impl RingConfig {
    /// Create a configuration with the specified slot count.
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(SluiceError::invalid_argument("ring size must be greater than 0"));
        }
        if !size.is_power_of_two() {
            return Err(SluiceError::invalid_argument("ring size must be power of 2"));
        }

        Ok(Self { size })
    }
}
