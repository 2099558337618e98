//! One-shot result cell
//!
//! A synchronized holder for the outcome of a computation executed at most
//! once, with blocking and timed retrieval by multiple waiters and
//! cooperative cancellation. The lifecycle is a small state machine on an
//! atomic word; waiters block on a purpose-built latch (mutex + condvar)
//! rather than a general synchronizer framework.
//!
//! Cancellation is advisory: `cancel(true)` trips the cell's
//! [`CancelToken`] and unparks the recorded worker thread, but a
//! computation that never polls the token runs to completion and its
//! result is simply discarded.

use std::sync::atomic::{ AtomicBool, AtomicU8, Ordering };
use std::sync::Arc;
use std::thread::{ self, Thread };
use std::time::{ Duration, Instant };

use parking_lot::{ Condvar, Mutex };

use crate::error::{ HandlerError, Result, SluiceError, TaskError };
use crate::insights;

/// Task is ready to run
const READY: u8 = 0;
/// Task is running on some thread
const RUNNING: u8 = 1;
/// Task ran to a terminal outcome (value or failure)
const RAN: u8 = 2;
/// Task was cancelled
const CANCELLED: u8 = 4;
/// Bit mask of the terminal states
const TERMINAL: u8 = RAN | CANCELLED;

type Task<V> = Box<dyn FnMut(&CancelToken) -> std::result::Result<V, HandlerError> + Send>;

/// Cooperative cancellation signal handed to the running task.
///
/// The task observes cancellation at its own polling points via
/// [`CancelToken::is_cancelled`] or [`CancelToken::check`].
#[derive(Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    fn new() -> Self {
        Self { flag: Arc::new(AtomicBool::new(false)) }
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Fail with [`SluiceError::Interrupted`] once cancellation has been
    /// requested; a polling point for long computations.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(SluiceError::Interrupted);
        }
        Ok(())
    }
}

struct CellInner<V> {
    task: Option<Task<V>>,
    value: Option<V>,
    failure: Option<TaskError>,
    worker: Option<Thread>,
    done_hook: Option<Box<dyn FnOnce() + Send>>,
}

/// Holder for the outcome of an at-most-once computation.
///
/// Shared behind `Arc`: one thread calls [`run`](Self::run) while any
/// number of threads block in [`get`](Self::get) or race
/// [`cancel`](Self::cancel).
pub struct ResultCell<V> {
    state: AtomicU8,
    /// Release edge of the terminal transition: set after the outcome slot
    /// is written and the worker reference cleared.
    completed: AtomicBool,
    inner: Mutex<CellInner<V>>,
    gate: Condvar,
    token: CancelToken,
}

impl<V> ResultCell<V> {
    /// Create a cell around a computation. The task receives the cell's
    /// [`CancelToken`] so it can observe cancellation at polling points.
    pub fn new<F>(task: F) -> Self
        where F: FnMut(&CancelToken) -> std::result::Result<V, HandlerError> + Send + 'static
    {
        Self {
            state: AtomicU8::new(READY),
            completed: AtomicBool::new(false),
            inner: Mutex::new(CellInner {
                task: Some(Box::new(task)),
                value: None,
                failure: None,
                worker: None,
                done_hook: None,
            }),
            gate: Condvar::new(),
            token: CancelToken::new(),
        }
    }

    /// Create a cell around a parameterless action plus the fixed value
    /// `get` reports on success.
    pub fn with_result<A>(mut action: A, result: V) -> Self
        where
            A: FnMut(&CancelToken) -> std::result::Result<(), HandlerError> + Send + 'static,
            V: Clone + Send + 'static
    {
        Self::new(move |token| {
            action(token)?;
            Ok(result.clone())
        })
    }

    /// Register the post-completion hook, invoked exactly once per terminal
    /// transition (normal completion, failure, or cancellation).
    pub fn on_done(self, hook: impl FnOnce() + Send + 'static) -> Self {
        {
            self.inner.lock().done_hook = Some(Box::new(hook));
        }
        self
    }

    /// Token for external polling of the cancellation flag.
    pub fn cancel_token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Execute the task unless the cell has left READY. A no-op when the
    /// task already ran or a cancel won the race.
    pub fn run(&self) {
        if self.state.compare_exchange(READY, RUNNING, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            return;
        }

        let task_slot = {
            let mut inner = self.inner.lock();
            inner.worker = Some(thread::current());
            inner.task.take()
        };

        // A cancel may have landed between the claim and the worker publish.
        if self.state.load(Ordering::SeqCst) != RUNNING {
            self.restore_task(task_slot);
            self.release_gate();
            return;
        }

        let Some(mut task) = task_slot else {
            self.release_gate();
            return;
        };
        let outcome = task(&self.token);
        self.restore_task(Some(task));

        match outcome {
            Ok(value) => self.set(value),
            Err(error) => self.set_failure(error),
        }
    }

    /// Execute the task and, on success, return the cell to READY without
    /// recording the value. Returns whether the full run-and-reset cycle
    /// completed (false on failure, cancellation, or a lost claim race).
    pub fn run_and_reset(&self) -> bool {
        if self.state.compare_exchange(READY, RUNNING, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            return false;
        }

        let task_slot = {
            let mut inner = self.inner.lock();
            inner.worker = Some(thread::current());
            inner.task.take()
        };

        if self.state.load(Ordering::SeqCst) != RUNNING {
            self.restore_task(task_slot);
            self.release_gate();
            return false;
        }

        let Some(mut task) = task_slot else {
            self.release_gate();
            return false;
        };
        let outcome = task(&self.token);
        self.restore_task(Some(task));

        match outcome {
            Ok(_discarded) => {
                self.inner.lock().worker = None;
                self.state
                    .compare_exchange(RUNNING, READY, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
            }
            Err(error) => {
                self.set_failure(error);
                false
            }
        }
    }

    /// Record the success value unless a terminal transition already won.
    pub fn set(&self, value: V) {
        loop {
            let state = self.state.load(Ordering::SeqCst);
            if state == RAN {
                return;
            }
            if state == CANCELLED {
                // A racing cancel is waiting on the worker release.
                self.release_gate();
                return;
            }
            if self.state.compare_exchange(state, RAN, Ordering::SeqCst, Ordering::SeqCst).is_ok() {
                self.inner.lock().value = Some(value);
                self.release_gate();
                self.notify_done();
                return;
            }
        }
    }

    /// Record the failure cause unless a terminal transition already won.
    pub fn set_failure(&self, error: HandlerError) {
        let cause = TaskError::from(error);
        loop {
            let state = self.state.load(Ordering::SeqCst);
            if state == RAN {
                return;
            }
            if state == CANCELLED {
                self.release_gate();
                return;
            }
            if self.state.compare_exchange(state, RAN, Ordering::SeqCst, Ordering::SeqCst).is_ok() {
                self.inner.lock().failure = Some(cause);
                self.release_gate();
                self.notify_done();
                return;
            }
        }
    }

    /// Cancel the computation. Returns false if the cell is already
    /// terminal. With `interrupt_if_running`, trips the cancel token and
    /// unparks the recorded worker so a parked task can observe it.
    pub fn cancel(&self, interrupt_if_running: bool) -> bool {
        loop {
            let state = self.state.load(Ordering::SeqCst);
            if (state & TERMINAL) != 0 {
                return false;
            }
            if
                self.state
                    .compare_exchange(state, CANCELLED, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
            {
                break;
            }
        }

        insights::record_cancel(interrupt_if_running);
        if interrupt_if_running {
            self.token.flag.store(true, Ordering::Release);
            let worker = self.inner.lock().worker.clone();
            if let Some(worker) = worker {
                worker.unpark();
            }
        }

        self.release_gate();
        self.notify_done();
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::SeqCst) == CANCELLED
    }

    /// True once a terminal transition is fully published (outcome written,
    /// worker cleared).
    pub fn is_done(&self) -> bool {
        (self.state.load(Ordering::SeqCst) & TERMINAL) != 0 &&
            self.completed.load(Ordering::Acquire)
    }

    /// Block until the terminal gate releases, then report the outcome.
    pub fn get(&self) -> Result<V> where V: Clone {
        let mut inner = self.inner.lock();
        while !self.completed.load(Ordering::Acquire) {
            self.gate.wait(&mut inner);
        }
        self.read_outcome(&inner)
    }

    /// As [`get`](Self::get), failing with [`SluiceError::Timeout`] when
    /// the gate is not passed before the deadline.
    pub fn get_timeout(&self, timeout: Duration) -> Result<V> where V: Clone {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        while !self.completed.load(Ordering::Acquire) {
            if
                self.gate.wait_until(&mut inner, deadline).timed_out() &&
                !self.completed.load(Ordering::Acquire)
            {
                return Err(SluiceError::Timeout);
            }
        }
        self.read_outcome(&inner)
    }

    fn read_outcome(&self, inner: &CellInner<V>) -> Result<V> where V: Clone {
        if self.state.load(Ordering::SeqCst) == CANCELLED {
            return Err(SluiceError::Cancelled);
        }
        if let Some(failure) = &inner.failure {
            return Err(SluiceError::Execution(failure.clone()));
        }
        match &inner.value {
            Some(value) => Ok(value.clone()),
            None => Err(SluiceError::invalid_state("cell completed without an outcome")),
        }
    }

    fn restore_task(&self, task: Option<Task<V>>) {
        if task.is_some() {
            self.inner.lock().task = task;
        }
    }

    /// Publish the terminal transition: clear the worker reference, flip
    /// the completion flag, wake every waiter. Idempotent.
    fn release_gate(&self) {
        let mut inner = self.inner.lock();
        inner.worker = None;
        self.completed.store(true, Ordering::Release);
        self.gate.notify_all();
    }

    fn notify_done(&self) {
        let hook = self.inner.lock().done_hook.take();
        if let Some(hook) = hook {
            hook();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_run_then_get() {
        let cell = ResultCell::new(|_| Ok(42u32));
        cell.run();
        assert_eq!(cell.get().unwrap(), 42);
        assert!(cell.is_done());
        assert!(!cell.is_cancelled());
    }

    #[test]
    fn test_run_is_at_most_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let cell = {
            let runs = runs.clone();
            ResultCell::new(move |_| {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(1u32)
            })
        };
        cell.run();
        cell.run();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(cell.get().unwrap(), 1);
    }

    #[test]
    fn test_failure_surfaces_as_execution() {
        let cell: ResultCell<u32> = ResultCell::new(|_| Err("task exploded".into()));
        cell.run();
        match cell.get() {
            Err(SluiceError::Execution(cause)) => {
                assert!(cause.to_string().contains("task exploded"));
            }
            other => panic!("expected Execution, got {other:?}"),
        }
        assert!(cell.is_done());
    }

    #[test]
    fn test_cancel_before_run() {
        let cell = ResultCell::new(|_| Ok(5u32));
        assert!(cell.cancel(false));
        assert!(cell.is_cancelled());
        assert!(cell.is_done());

        // The task never runs once cancelled.
        cell.run();
        assert!(matches!(cell.get(), Err(SluiceError::Cancelled)));

        // Duplicate cancel is a no-op.
        assert!(!cell.cancel(true));
    }

    #[test]
    fn test_terminal_set_is_exactly_once() {
        let cell = ResultCell::new(|_| Ok(1u32));
        cell.run();
        cell.set(99);
        cell.set_failure("late failure".into());
        assert!(!cell.cancel(false));
        assert_eq!(cell.get().unwrap(), 1);
    }

    #[test]
    fn test_done_hook_fires_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cell = {
            let calls = calls.clone();
            ResultCell::new(|_| Ok(7u32)).on_done(move || {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };
        cell.run();
        cell.set(8);
        assert!(!cell.cancel(false));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_get_timeout_expires() {
        let cell = ResultCell::new(|_| Ok(1u32));
        let result = cell.get_timeout(Duration::from_millis(10));
        assert!(matches!(result, Err(SluiceError::Timeout)));
    }

    #[test]
    fn test_multiple_waiters_receive_value() {
        let cell = Arc::new(ResultCell::new(|_| Ok(42u32)));
        let waiters: Vec<_> = (0..2)
            .map(|_| {
                let cell = cell.clone();
                thread::spawn(move || cell.get().unwrap())
            })
            .collect();

        thread::sleep(Duration::from_millis(10));
        cell.run();

        for waiter in waiters {
            assert_eq!(waiter.join().unwrap(), 42);
        }
    }

    #[test]
    fn test_cancel_interrupts_parked_task() {
        let cell = Arc::new(
            ResultCell::new(|token: &CancelToken| {
                while !token.is_cancelled() {
                    thread::park_timeout(Duration::from_millis(50));
                }
                token.check()?;
                Ok(0u32)
            })
        );

        let runner = {
            let cell = cell.clone();
            thread::spawn(move || cell.run())
        };

        thread::sleep(Duration::from_millis(20));
        assert!(cell.cancel(true));
        runner.join().unwrap();

        assert!(cell.is_cancelled());
        assert!(cell.is_done());
        assert!(matches!(cell.get(), Err(SluiceError::Cancelled)));
    }

    #[test]
    fn test_run_and_reset_cycles() {
        let runs = Arc::new(AtomicUsize::new(0));
        let cell = {
            let runs = runs.clone();
            ResultCell::new(move |_| {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(0u32)
            })
        };

        assert!(cell.run_and_reset());
        assert!(cell.run_and_reset());
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert!(!cell.is_done());

        // A normal run still works after resets.
        cell.run();
        assert_eq!(cell.get().unwrap(), 0);
        assert!(!cell.run_and_reset());
    }

    #[test]
    fn test_run_and_reset_failure_is_terminal() {
        let cell: ResultCell<u32> = ResultCell::new(|_| Err("periodic task broke".into()));
        assert!(!cell.run_and_reset());
        assert!(cell.is_done());
        assert!(matches!(cell.get(), Err(SluiceError::Execution(_))));
    }

    #[test]
    fn test_with_result_reports_fixed_value() {
        let ran = Arc::new(AtomicUsize::new(0));
        let cell = {
            let ran = ran.clone();
            ResultCell::with_result(
                move |_| {
                    ran.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                },
                "done".to_string()
            )
        };
        cell.run();
        assert_eq!(cell.get().unwrap(), "done");
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancel_token_check() {
        let token = CancelToken::new();
        assert!(token.check().is_ok());
        token.flag.store(true, Ordering::Release);
        assert!(matches!(token.check(), Err(SluiceError::Interrupted)));
    }
}
