//! Wait strategies for ring consumers
//!
//! A wait strategy controls how a consumer stalls until its target sequence
//! becomes consumable. Each strategy trades latency against CPU burn:
//! busy-spin for the lowest latency, yielding as a middle ground, and the
//! blocking variants when cores are scarce.

use std::sync::atomic::{ AtomicBool, Ordering };
use std::thread;
use std::time::{ Duration, Instant };

use parking_lot::{ Condvar, Mutex };

use crate::constants::SPIN_TRIES;
use crate::error::{ Result, SluiceError };
use crate::ring::sequence::{ DependentSequences, Sequence };

/// Policy for how a consumer waits for a sequence to become consumable.
///
/// `wait_for` returns an available sequence `>= sequence` on success; the
/// alert flag is observed on every iteration and surfaced as
/// [`SluiceError::Alerted`]. Strategies that block are woken by
/// `signal_all_when_blocking`, which the sequencer invokes on publish.
pub trait WaitStrategy: Send + Sync {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &DependentSequences,
        alerted: &AtomicBool
    ) -> Result<i64>;

    /// Signal that new data is available
    fn signal_all_when_blocking(&self);
}

#[inline]
fn check_alert(alerted: &AtomicBool) -> Result<()> {
    if alerted.load(Ordering::Acquire) {
        return Err(SluiceError::Alerted);
    }
    Ok(())
}

/// Busy spin wait strategy - lowest latency, highest CPU usage.
/// Continuously checks for the target sequence in a tight loop; ideal when
/// latency is critical and a core can be dedicated to the consumer.
pub struct BusySpinWaitStrategy;

impl BusySpinWaitStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BusySpinWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for BusySpinWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        _cursor: &Sequence,
        dependents: &DependentSequences,
        alerted: &AtomicBool
    ) -> Result<i64> {
        loop {
            let available = dependents.value();
            if available >= sequence {
                return Ok(available);
            }
            check_alert(alerted)?;
            std::hint::spin_loop();
        }
    }

    fn signal_all_when_blocking(&self) {
        // No-op for busy spin - no blocking threads to signal
    }
}

/// Yielding wait strategy - moderate CPU usage and latency.
/// Spins a bounded number of times, then yields the core to other threads
/// between checks.
pub struct YieldingWaitStrategy {
    spin_tries: u32,
}

impl YieldingWaitStrategy {
    pub fn new() -> Self {
        Self { spin_tries: SPIN_TRIES }
    }

    pub fn with_spin_tries(spin_tries: u32) -> Self {
        Self { spin_tries }
    }
}

impl Default for YieldingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for YieldingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        _cursor: &Sequence,
        dependents: &DependentSequences,
        alerted: &AtomicBool
    ) -> Result<i64> {
        let mut counter = self.spin_tries;

        loop {
            let available = dependents.value();
            if available >= sequence {
                return Ok(available);
            }
            check_alert(alerted)?;

            if counter > 0 {
                counter -= 1;
                std::hint::spin_loop();
            } else {
                thread::yield_now();
            }
        }
    }

    fn signal_all_when_blocking(&self) {
        // No-op for yielding - threads wake up on their own
    }
}

/// Blocking wait strategy - lowest CPU usage, higher wake-up latency.
/// Parks the consumer on a condition variable until the producer publishes,
/// then spins briefly on the dependent view.
pub struct BlockingWaitStrategy {
    mutex: Mutex<()>,
    condition: Condvar,
}

impl BlockingWaitStrategy {
    pub fn new() -> Self {
        Self {
            mutex: Mutex::new(()),
            condition: Condvar::new(),
        }
    }
}

impl Default for BlockingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for BlockingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &DependentSequences,
        alerted: &AtomicBool
    ) -> Result<i64> {
        if cursor.get() < sequence {
            let mut guard = self.mutex.lock();
            while cursor.get() < sequence {
                check_alert(alerted)?;
                self.condition.wait(&mut guard);
            }
        }

        // Cursor has passed the target; upstream consumers may still be behind.
        loop {
            let available = dependents.value();
            if available >= sequence {
                return Ok(available);
            }
            check_alert(alerted)?;
            std::hint::spin_loop();
        }
    }

    fn signal_all_when_blocking(&self) {
        let _guard = self.mutex.lock();
        self.condition.notify_all();
    }
}

/// Timeout wait strategy - as blocking, with a deadline.
/// Fails with [`SluiceError::Timeout`] when the cursor does not reach the
/// target in time; processors report this to their timeout hook and keep
/// running.
pub struct TimeoutBlockingWaitStrategy {
    mutex: Mutex<()>,
    condition: Condvar,
    timeout: Duration,
}

impl TimeoutBlockingWaitStrategy {
    pub fn new(timeout: Duration) -> Self {
        Self {
            mutex: Mutex::new(()),
            condition: Condvar::new(),
            timeout,
        }
    }
}

impl WaitStrategy for TimeoutBlockingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &DependentSequences,
        alerted: &AtomicBool
    ) -> Result<i64> {
        if cursor.get() < sequence {
            let deadline = Instant::now() + self.timeout;
            let mut guard = self.mutex.lock();
            while cursor.get() < sequence {
                check_alert(alerted)?;
                if self.condition.wait_until(&mut guard, deadline).timed_out() {
                    if cursor.get() >= sequence {
                        break;
                    }
                    return Err(SluiceError::Timeout);
                }
            }
        }

        loop {
            let available = dependents.value();
            if available >= sequence {
                return Ok(available);
            }
            check_alert(alerted)?;
            std::hint::spin_loop();
        }
    }

    fn signal_all_when_blocking(&self) {
        let _guard = self.mutex.lock();
        self.condition.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn cursor_view(cursor: &Arc<Sequence>) -> DependentSequences {
        DependentSequences::new(cursor.clone(), vec![])
    }

    #[test]
    fn test_busy_spin_returns_available() {
        let strategy = BusySpinWaitStrategy::new();
        let cursor = Arc::new(Sequence::new(100));
        let alerted = AtomicBool::new(false);

        let available = strategy
            .wait_for(100, &cursor, &cursor_view(&cursor), &alerted)
            .unwrap();
        assert_eq!(available, 100);
    }

    #[test]
    fn test_busy_spin_observes_alert() {
        let strategy = BusySpinWaitStrategy::new();
        let cursor = Arc::new(Sequence::new(-1));
        let alerted = AtomicBool::new(true);

        let result = strategy.wait_for(0, &cursor, &cursor_view(&cursor), &alerted);
        assert!(matches!(result, Err(SluiceError::Alerted)));
    }

    #[test]
    fn test_yielding_waits_for_dependent_group() {
        let strategy = YieldingWaitStrategy::with_spin_tries(4);
        let cursor = Arc::new(Sequence::new(100));
        let upstream = Arc::new(Sequence::new(-1));
        let view = DependentSequences::new(cursor.clone(), vec![upstream.clone()]);
        let alerted = Arc::new(AtomicBool::new(false));

        let advancer = {
            let upstream = upstream.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                upstream.set(7);
            })
        };

        let available = strategy.wait_for(5, &cursor, &view, &alerted).unwrap();
        assert_eq!(available, 7);
        advancer.join().unwrap();
    }

    #[test]
    fn test_blocking_wakes_on_signal() {
        let strategy = Arc::new(BlockingWaitStrategy::new());
        let cursor = Arc::new(Sequence::new(-1));
        let alerted = Arc::new(AtomicBool::new(false));

        let publisher = {
            let strategy = strategy.clone();
            let cursor = cursor.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                cursor.set(3);
                strategy.signal_all_when_blocking();
            })
        };

        let view = cursor_view(&cursor);
        let available = strategy.wait_for(0, &cursor, &view, &alerted).unwrap();
        assert!(available >= 0);
        publisher.join().unwrap();
    }

    #[test]
    fn test_blocking_wakes_on_alert() {
        let strategy = Arc::new(BlockingWaitStrategy::new());
        let cursor = Arc::new(Sequence::new(-1));
        let alerted = Arc::new(AtomicBool::new(false));

        let alerter = {
            let strategy = strategy.clone();
            let alerted = alerted.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                alerted.store(true, Ordering::Release);
                strategy.signal_all_when_blocking();
            })
        };

        let view = cursor_view(&cursor);
        let result = strategy.wait_for(0, &cursor, &view, &alerted);
        assert!(matches!(result, Err(SluiceError::Alerted)));
        alerter.join().unwrap();
    }

    #[test]
    fn test_timeout_blocking_times_out() {
        let strategy = TimeoutBlockingWaitStrategy::new(Duration::from_millis(5));
        let cursor = Arc::new(Sequence::new(-1));
        let alerted = AtomicBool::new(false);

        let view = cursor_view(&cursor);
        let result = strategy.wait_for(0, &cursor, &view, &alerted);
        assert!(matches!(result, Err(SluiceError::Timeout)));
    }

    #[test]
    fn test_timeout_blocking_returns_when_published() {
        let strategy = TimeoutBlockingWaitStrategy::new(Duration::from_secs(5));
        let cursor = Arc::new(Sequence::new(2));
        let alerted = AtomicBool::new(false);

        let view = cursor_view(&cursor);
        let available = strategy.wait_for(1, &cursor, &view, &alerted).unwrap();
        assert_eq!(available, 2);
    }
}
