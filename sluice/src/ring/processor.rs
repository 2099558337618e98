//! Batch event processor
//!
//! A long-running worker that waits on a barrier, drains the contiguous
//! range of newly available slots through an event handler, and advances
//! its own sequence so downstream processors can gate on it.

use std::marker::PhantomData;
use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{ HandlerError, Result, SluiceError };
use crate::insights;
use crate::metrics::METRICS;
use crate::ring::barrier::SequenceBarrier;
use crate::ring::ring_buffer::DataProvider;
use crate::ring::sequence::Sequence;

/// Callback invoked for every event drained from the ring.
///
/// The optional capabilities (lifecycle, timeout, mid-batch sequence
/// reporting) are default methods, so a handler opts in by overriding them
/// and the processor never inspects the handler's concrete type.
pub trait EventHandler<E>: Send {
    /// Handle one event. `end_of_batch` marks the last slot of the drained
    /// range. A returned error is routed to the exception handler and the
    /// processor advances past the offending sequence.
    fn on_event(
        &mut self,
        event: &E,
        sequence: i64,
        end_of_batch: bool
    ) -> std::result::Result<(), HandlerError>;

    /// Called once when the owning processor starts.
    fn on_start(&mut self) -> std::result::Result<(), HandlerError> {
        Ok(())
    }

    /// Called once when the owning processor shuts down.
    fn on_shutdown(&mut self) -> std::result::Result<(), HandlerError> {
        Ok(())
    }

    /// Called when the barrier's wait strategy reports a timeout.
    fn on_timeout(&mut self, _sequence: i64) -> std::result::Result<(), HandlerError> {
        Ok(())
    }

    /// Receives the processor's own sequence, allowing a handler to advance
    /// it mid-batch (for batching handlers that checkpoint early).
    fn set_sequence_callback(&mut self, _sequence: Arc<Sequence>) {}
}

/// Hook for errors escaping the handler; the processor loop never
/// terminates on a handler error.
pub trait ExceptionHandler<E>: Send {
    fn handle_event_error(&mut self, error: HandlerError, sequence: i64, event: Option<&E>);

    fn handle_start_error(&mut self, error: HandlerError) {
        self.handle_event_error(error, -1, None);
    }

    fn handle_shutdown_error(&mut self, error: HandlerError) {
        self.handle_event_error(error, -1, None);
    }
}

/// Default exception handler: records the error and keeps the pipeline
/// moving.
#[derive(Default)]
pub struct RecordingExceptionHandler {
    count: u64,
}

impl RecordingExceptionHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

impl<E> ExceptionHandler<E> for RecordingExceptionHandler {
    fn handle_event_error(&mut self, error: HandlerError, sequence: i64, _event: Option<&E>) {
        self.count += 1;
        insights::record_handler_error(sequence, &error);
        METRICS.record_handler_error();
    }
}

/// Worker that drains batches of available slots through an [`EventHandler`].
///
/// One processor occupies one thread for the duration of `run`; `halt` from
/// any thread stops it, and a halted processor may be run again.
pub struct BatchEventProcessor<E, D, H>
where
    D: DataProvider<E>,
    H: EventHandler<E>,
{
    running: AtomicBool,
    data_provider: Arc<D>,
    barrier: SequenceBarrier,
    handler: Mutex<H>,
    sequence: Arc<Sequence>,
    exception_handler: Mutex<Box<dyn ExceptionHandler<E> + Send>>,
    _marker: PhantomData<fn(E)>,
}

impl<E, D, H> BatchEventProcessor<E, D, H>
where
    E: Send + 'static,
    D: DataProvider<E>,
    H: EventHandler<E>,
{
    pub fn new(data_provider: Arc<D>, barrier: SequenceBarrier, mut handler: H) -> Self {
        let sequence = Arc::new(Sequence::default());
        handler.set_sequence_callback(sequence.clone());

        Self {
            running: AtomicBool::new(false),
            data_provider,
            barrier,
            handler: Mutex::new(handler),
            sequence,
            exception_handler: Mutex::new(Box::new(RecordingExceptionHandler::new())),
            _marker: PhantomData,
        }
    }

    /// The processor's own sequence: last slot fully handed to the handler.
    /// Register it as a gating sequence on the sequencer, or as an upstream
    /// dependency of downstream barriers.
    pub fn sequence(&self) -> Arc<Sequence> {
        self.sequence.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn set_exception_handler(&self, handler: Box<dyn ExceptionHandler<E> + Send>) {
        *self.exception_handler.lock() = handler;
    }

    /// Stop the processor: clears the running flag and alerts the barrier
    /// so a blocked wait wakes up.
    pub fn halt(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.barrier.alert();
    }

    /// Drive the event loop until halted. Fails if this processor is
    /// already running on another thread; a halted processor can be rerun.
    pub fn run(&self) -> Result<()> {
        if self.running.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            return Err(SluiceError::invalid_state("processor already running"));
        }

        self.barrier.clear_alert();

        let mut handler = self.handler.lock();
        if let Err(error) = handler.on_start() {
            self.exception_handler.lock().handle_start_error(error);
        }

        let mut next_sequence = self.sequence.get() + 1;
        loop {
            match self.barrier.wait_for(next_sequence) {
                Ok(available_sequence) => {
                    let batch_start = next_sequence;
                    let mut failed: Option<HandlerError> = None;

                    while next_sequence <= available_sequence {
                        let event = self.data_provider.get(next_sequence);
                        let end_of_batch = next_sequence == available_sequence;
                        if let Err(error) = handler.on_event(event, next_sequence, end_of_batch) {
                            failed = Some(error);
                            break;
                        }
                        next_sequence += 1;
                    }

                    match failed {
                        None => {
                            let batch_len = available_sequence - batch_start + 1;
                            if batch_len > 0 {
                                insights::record_batch(batch_len);
                                METRICS.record_batch(batch_len as u64);
                            }
                            self.sequence.set(available_sequence);
                        }
                        Some(error) => {
                            // Advance past the offending slot so downstream
                            // consumers are not blocked; the rest of the
                            // batch is re-claimed on the next wait.
                            let event = self.data_provider.get(next_sequence);
                            self.exception_handler
                                .lock()
                                .handle_event_error(error, next_sequence, Some(event));
                            self.sequence.set(next_sequence);
                            next_sequence += 1;
                        }
                    }
                }
                Err(SluiceError::Timeout) => {
                    METRICS.record_timeout();
                    let current = self.sequence.get();
                    insights::record_timeout(current);
                    if let Err(error) = handler.on_timeout(current) {
                        self.exception_handler.lock().handle_event_error(error, current, None);
                    }
                }
                Err(SluiceError::Alerted) => {
                    insights::record_alert();
                    if !self.running.load(Ordering::SeqCst) {
                        break;
                    }
                }
                Err(error) => {
                    self.exception_handler
                        .lock()
                        .handle_event_error(Box::new(error), next_sequence, None);
                    self.sequence.set(next_sequence);
                    next_sequence += 1;
                }
            }
        }

        if let Err(error) = handler.on_shutdown() {
            self.exception_handler.lock().handle_shutdown_error(error);
        }
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }
}
