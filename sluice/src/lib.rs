//! # sluice
//!
//! High-throughput, low-latency inter-thread event passing.
//!
//! Two primitives make up the crate:
//!
//! - **Sequenced ring coordination** - a bounded slot array published into
//!   by one producer and drained by processor pipelines whose progress is
//!   expressed as padded monotonic sequences. A [`ring::SequenceBarrier`]
//!   gates each processor on the producer cursor and any upstream
//!   processors, with a pluggable [`ring::WaitStrategy`].
//! - **One-shot result cell** - [`result_cell::ResultCell`], a cancellable
//!   holder for the outcome of an at-most-once computation with blocking
//!   and timed retrieval.
//!
//! No locks on the hot path: slot access discipline is enforced entirely by
//! the sequence contracts, and the cursor release on publish pairs with the
//! consumer acquire on read.
//!
//! ```
//! use std::sync::Arc;
//! use sluice::ring::{
//!     BatchEventProcessor, BusySpinWaitStrategy, EventHandler, RingBuffer,
//!     SingleProducerSequencer,
//! };
//!
//! struct Sum(u64);
//!
//! impl EventHandler<u64> for Sum {
//!     fn on_event(
//!         &mut self,
//!         event: &u64,
//!         _sequence: i64,
//!         _end_of_batch: bool,
//!     ) -> Result<(), sluice::HandlerError> {
//!         self.0 += *event;
//!         Ok(())
//!     }
//! }
//!
//! let sequencer =
//!     Arc::new(SingleProducerSequencer::new(8, Arc::new(BusySpinWaitStrategy::new())).unwrap());
//! let ring = Arc::new(RingBuffer::<u64>::new(8).unwrap());
//! let processor = BatchEventProcessor::new(ring.clone(), sequencer.new_barrier(vec![]), Sum(0));
//! sequencer.add_gating_sequences(&[processor.sequence()]);
//!
//! let seq = sequencer.next().unwrap();
//! unsafe { *ring.slot_mut(seq) = 7 };
//! sequencer.publish(seq);
//! ```

pub mod constants;
pub mod error;
pub mod insights;
pub mod metrics;
pub mod ring;
pub mod result_cell;

pub use constants::{ DEFAULT_RING_SIZE, INITIAL_CURSOR_VALUE };
pub use error::{ HandlerError, Result, SluiceError, TaskError };
pub use metrics::{ Metrics, MetricsSnapshot, METRICS };
pub use result_cell::{ CancelToken, ResultCell };
