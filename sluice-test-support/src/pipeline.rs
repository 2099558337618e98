//! One-call wiring of SPSC test pipelines.

use std::sync::Arc;
use std::time::{ Duration, Instant };

use sluice::ring::{
    BatchEventProcessor,
    EventHandler,
    RingBuffer,
    Sequence,
    SingleProducerSequencer,
    WaitStrategy,
};

/// A wired single-producer pipeline with one processor stage.
pub struct SpscPipeline<H: EventHandler<u64>> {
    pub sequencer: Arc<SingleProducerSequencer>,
    pub ring: Arc<RingBuffer<u64>>,
    pub processor: Arc<BatchEventProcessor<u64, RingBuffer<u64>, H>>,
}

impl<H: EventHandler<u64>> SpscPipeline<H> {
    /// Claim, write and publish one payload.
    pub fn publish(&self, payload: u64) {
        let seq = self.sequencer.next().expect("claim failed");
        unsafe {
            *self.ring.slot_mut(seq) = payload;
        }
        self.sequencer.publish(seq);
    }
}

/// Build a sequencer, ring and gated processor over `u64` payloads. The
/// processor's sequence is registered as the producer's gating sequence.
pub fn spsc_pipeline<H: EventHandler<u64>>(
    size: usize,
    strategy: Arc<dyn WaitStrategy>,
    handler: H
) -> SpscPipeline<H> {
    let sequencer = Arc::new(SingleProducerSequencer::new(size, strategy).expect("bad ring size"));
    let ring = Arc::new(RingBuffer::<u64>::new(size).expect("bad ring size"));
    let processor = Arc::new(
        BatchEventProcessor::new(ring.clone(), sequencer.new_barrier(vec![]), handler)
    );
    sequencer.add_gating_sequences(&[processor.sequence()]);

    SpscPipeline { sequencer, ring, processor }
}

/// Spin until `sequence` reaches `target`, panicking after `timeout`.
pub fn wait_for_sequence(sequence: &Arc<Sequence>, target: i64, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while sequence.get() < target {
        assert!(
            Instant::now() < deadline,
            "sequence stuck at {} waiting for {}",
            sequence.get(),
            target
        );
        std::thread::yield_now();
    }
}
