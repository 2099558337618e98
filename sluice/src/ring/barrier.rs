//! Sequence barrier
//!
//! Gates a processor on the producer cursor and the sequences of upstream
//! processors, using the sequencer's wait strategy. Also carries the alert
//! flag used for cooperative shutdown.

use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::Arc;

use crate::error::{ Result, SluiceError };
use crate::ring::sequence::{ DependentSequences, Sequence };
use crate::ring::sequencer::SequencePublication;
use crate::ring::wait_strategy::WaitStrategy;

/// Barrier handed out by the sequencer for gating a processor.
pub struct SequenceBarrier {
    publication: Arc<dyn SequencePublication>,
    wait_strategy: Arc<dyn WaitStrategy>,
    cursor: Arc<Sequence>,
    dependents: DependentSequences,
    alerted: AtomicBool,
}

impl SequenceBarrier {
    pub(crate) fn new(
        publication: Arc<dyn SequencePublication>,
        wait_strategy: Arc<dyn WaitStrategy>,
        cursor: Arc<Sequence>,
        dependents: Vec<Arc<Sequence>>
    ) -> Self {
        Self {
            publication,
            wait_strategy,
            cursor: cursor.clone(),
            dependents: DependentSequences::new(cursor, dependents),
            alerted: AtomicBool::new(false),
        }
    }

    /// Wait until `sequence` is consumable and return the highest
    /// contiguously published sequence at or beyond it.
    pub fn wait_for(&self, sequence: i64) -> Result<i64> {
        self.check_alert()?;

        let available = self.wait_strategy.wait_for(
            sequence,
            &self.cursor,
            &self.dependents,
            &self.alerted
        )?;

        if available < sequence {
            return Ok(available);
        }

        Ok(self.publication.highest_published_sequence(sequence, available))
    }

    /// Value of the dependent view this barrier gates on.
    pub fn get_cursor(&self) -> i64 {
        self.dependents.value()
    }

    pub fn is_alerted(&self) -> bool {
        self.alerted.load(Ordering::Acquire)
    }

    /// Trip the alert and wake blocked waiters.
    pub fn alert(&self) {
        self.alerted.store(true, Ordering::Release);
        self.wait_strategy.signal_all_when_blocking();
    }

    pub fn clear_alert(&self) {
        self.alerted.store(false, Ordering::Release);
    }

    /// Fail with [`SluiceError::Alerted`] if the alert is set.
    pub fn check_alert(&self) -> Result<()> {
        if self.is_alerted() {
            return Err(SluiceError::Alerted);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::sequencer::SingleProducerSequencer;
    use crate::ring::wait_strategy::BusySpinWaitStrategy;

    fn sequencer(size: usize) -> Arc<SingleProducerSequencer> {
        Arc::new(
            SingleProducerSequencer::new(size, Arc::new(BusySpinWaitStrategy::new())).unwrap()
        )
    }

    #[test]
    fn test_wait_for_returns_published_sequence() {
        let sequencer = sequencer(8);
        let barrier = sequencer.new_barrier(vec![]);

        sequencer.next_n(3).unwrap();
        sequencer.publish(2);

        assert_eq!(barrier.wait_for(0).unwrap(), 2);
        assert_eq!(barrier.wait_for(2).unwrap(), 2);
    }

    #[test]
    fn test_wait_for_gates_on_dependents() {
        let sequencer = sequencer(8);
        let upstream = Arc::new(Sequence::default());
        let barrier = sequencer.new_barrier(vec![upstream.clone()]);

        sequencer.next_n(4).unwrap();
        sequencer.publish(3);

        // Cursor is at 3, but the upstream consumer has only reached 1.
        upstream.set(1);
        assert_eq!(barrier.wait_for(0).unwrap(), 1);
    }

    #[test]
    fn test_alert_round_trip() {
        let sequencer = sequencer(8);
        let barrier = sequencer.new_barrier(vec![]);

        assert!(!barrier.is_alerted());
        assert!(barrier.check_alert().is_ok());

        barrier.alert();
        assert!(barrier.is_alerted());
        assert!(matches!(barrier.wait_for(0), Err(SluiceError::Alerted)));

        barrier.clear_alert();
        assert!(barrier.check_alert().is_ok());
    }

    #[test]
    fn test_get_cursor_reports_dependent_view() {
        let sequencer = sequencer(8);
        let upstream = Arc::new(Sequence::new(5));
        let barrier = sequencer.new_barrier(vec![upstream]);

        sequencer.next_n(8).unwrap();
        sequencer.publish(7);
        assert_eq!(barrier.get_cursor(), 5);
    }
}
