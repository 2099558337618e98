//! Event handlers with externally observable state.

use std::sync::atomic::{ AtomicI64, AtomicU64, Ordering };
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use sluice::ring::EventHandler;
use sluice::HandlerError;

/// Appends every received payload to a shared list.
pub struct RecordingHandler {
    seen: Arc<Mutex<Vec<u64>>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self { seen: Arc::new(Mutex::new(Vec::new())) }
    }

    /// Shared view of the received payloads, in arrival order.
    pub fn seen(&self) -> Arc<Mutex<Vec<u64>>> {
        self.seen.clone()
    }
}

impl Default for RecordingHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler<u64> for RecordingHandler {
    fn on_event(
        &mut self,
        event: &u64,
        _sequence: i64,
        _end_of_batch: bool
    ) -> Result<(), HandlerError> {
        self.seen.lock().push(*event);
        Ok(())
    }
}

/// Sleeps for a fixed duration per event to simulate a slow consumer.
pub struct SleepingHandler {
    delay: Duration,
    handled: Arc<AtomicU64>,
}

impl SleepingHandler {
    pub fn new(delay: Duration) -> Self {
        Self { delay, handled: Arc::new(AtomicU64::new(0)) }
    }

    pub fn handled(&self) -> Arc<AtomicU64> {
        self.handled.clone()
    }
}

impl EventHandler<u64> for SleepingHandler {
    fn on_event(
        &mut self,
        _event: &u64,
        _sequence: i64,
        _end_of_batch: bool
    ) -> Result<(), HandlerError> {
        thread::sleep(self.delay);
        self.handled.fetch_add(1, Ordering::Release);
        Ok(())
    }
}

/// Fails exactly once, at the configured sequence.
pub struct FailingHandler {
    fail_at: i64,
    last_seen: Arc<AtomicI64>,
}

impl FailingHandler {
    pub fn new(fail_at: i64) -> Self {
        Self { fail_at, last_seen: Arc::new(AtomicI64::new(-1)) }
    }

    /// Highest sequence successfully handled.
    pub fn last_seen(&self) -> Arc<AtomicI64> {
        self.last_seen.clone()
    }
}

impl EventHandler<u64> for FailingHandler {
    fn on_event(
        &mut self,
        _event: &u64,
        sequence: i64,
        _end_of_batch: bool
    ) -> Result<(), HandlerError> {
        if sequence == self.fail_at {
            return Err(format!("injected failure at sequence {sequence}").into());
        }
        self.last_seen.store(sequence, Ordering::Release);
        Ok(())
    }
}

/// Hands events through without doing anything; a pipeline stage that only
/// contributes its sequence.
pub struct PassHandler;

impl EventHandler<u64> for PassHandler {
    fn on_event(
        &mut self,
        _event: &u64,
        _sequence: i64,
        _end_of_batch: bool
    ) -> Result<(), HandlerError> {
        Ok(())
    }
}
