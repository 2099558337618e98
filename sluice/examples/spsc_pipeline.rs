//! Average Calculator - SPSC pipeline example
//!
//! One producer publishes 1..=1,000,000 into the ring; one batch processor
//! accumulates the sum and reports the average.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use sluice::ring::{
    BatchEventProcessor,
    BusySpinWaitStrategy,
    EventHandler,
    RingBuffer,
    SingleProducerSequencer,
    WaitStrategy,
};
use sluice::HandlerError;

const RING_SIZE: usize = 64 * 1024;
const MAX_NUMBER: u64 = 1_000_000;

struct Averager {
    sum: u64,
    count: u64,
}

impl EventHandler<u64> for Averager {
    fn on_event(
        &mut self,
        event: &u64,
        _sequence: i64,
        _end_of_batch: bool
    ) -> Result<(), HandlerError> {
        self.sum += *event;
        self.count += 1;
        Ok(())
    }

    fn on_shutdown(&mut self) -> Result<(), HandlerError> {
        println!(
            "consumed {} events, sum={}, average={:.1}",
            self.count,
            self.sum,
            (self.sum as f64) / (self.count as f64)
        );
        Ok(())
    }
}

fn main() {
    println!("Task: average of 1 to {}\n", MAX_NUMBER);

    let strategy: Arc<dyn WaitStrategy> = Arc::new(BusySpinWaitStrategy::new());
    let sequencer = Arc::new(SingleProducerSequencer::new(RING_SIZE, strategy).unwrap());
    let ring = Arc::new(RingBuffer::<u64>::new(RING_SIZE).unwrap());

    let processor = Arc::new(
        BatchEventProcessor::new(ring.clone(), sequencer.new_barrier(vec![]), Averager {
            sum: 0,
            count: 0,
        })
    );
    sequencer.add_gating_sequences(&[processor.sequence()]);

    let consumer = {
        let processor = processor.clone();
        thread::spawn(move || processor.run())
    };

    let start = Instant::now();
    for n in 1..=MAX_NUMBER {
        let seq = sequencer.next().unwrap();
        unsafe {
            *ring.slot_mut(seq) = n;
        }
        sequencer.publish(seq);
    }

    while processor.sequence().get() < (MAX_NUMBER as i64) - 1 {
        std::hint::spin_loop();
    }
    let elapsed = start.elapsed();

    processor.halt();
    consumer.join().unwrap().unwrap();

    let rate = (MAX_NUMBER as f64) / elapsed.as_secs_f64() / 1e6;
    println!("published {} events in {:?} ({:.1} M events/s)", MAX_NUMBER, elapsed, rate);
    println!("metrics: {}", sluice::METRICS.snapshot());
}
