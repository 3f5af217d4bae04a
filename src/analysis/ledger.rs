use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use chrono::{Local, NaiveDateTime};
use log::warn;
use serde::Serialize;
use crate::analysis::aggregate::BatchResult;
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct SessionCounters {
    pub total_batches: u64,
    pub total_samples: u64,
    pub duration_seconds: f64,
}
/// Immutable view of the session published after every recorded batch.
#[derive(Clone, Debug)]
pub struct SessionSnapshot {
    start_time: NaiveDateTime,
    history: Vec<Arc<BatchResult>>, // oldest first
    counters: SessionCounters,
}
impl SessionSnapshot {
    fn empty(start_time: NaiveDateTime) -> Self {
        Self {
            start_time,
            history: Vec::new(),
            counters: SessionCounters::default(),
        }
    }
    pub fn start_time(&self) -> NaiveDateTime {
        self.start_time
    }
    pub fn latest_result(&self) -> Option<Arc<BatchResult>> {
        self.history.last().cloned()
    }
    /// Up to `limit` results, newest first.
    pub fn history(&self, limit: usize) -> Vec<Arc<BatchResult>> {
        self.history.iter().rev().take(limit).cloned().collect()
    }
    pub fn session_counters(&self) -> SessionCounters {
        self.counters
    }
}
/// Cloneable read side of the ledger.
#[derive(Clone)]
pub struct SnapshotHandle(Arc<RwLock<Arc<SessionSnapshot>>>);
impl SnapshotHandle {
    pub fn load(&self) -> Arc<SessionSnapshot> {
        match self.0.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => {
                warn!("session snapshot lock poisoned, reading last published value");
                Arc::clone(&poisoned.into_inner())
            }
        }
    }
    fn publish(&self, snapshot: SessionSnapshot) {
        let snapshot = Arc::new(snapshot);
        match self.0.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }
}
/// Bounded, append-only history of batch results owned by the engine.
pub struct SessionLedger {
    capacity: usize,
    start_time: NaiveDateTime,
    history: VecDeque<Arc<BatchResult>>,
    total_batches: u64,
    total_samples: u64,
    handle: SnapshotHandle,
}
impl SessionLedger {
    pub fn new(capacity: usize) -> Self {
        Self::starting_at(Local::now().naive_local(), capacity)
    }
    pub fn starting_at(start_time: NaiveDateTime, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            start_time,
            history: VecDeque::with_capacity(capacity),
            total_batches: 0,
            total_samples: 0,
            handle: SnapshotHandle(Arc::new(RwLock::new(Arc::new(SessionSnapshot::empty(start_time))))),
        }
    }
    pub fn handle(&self) -> SnapshotHandle {
        self.handle.clone()
    }
    pub fn start_time(&self) -> NaiveDateTime {
        self.start_time
    }
    pub fn record(&mut self, result: BatchResult) -> Arc<BatchResult> {
        let result = Arc::new(result);
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(Arc::clone(&result));
        self.total_batches += 1;
        self.total_samples += result.batch_size as u64;
        self.handle.publish(SessionSnapshot {
            start_time: self.start_time,
            history: self.history.iter().cloned().collect(),
            counters: self.counters(),
        });
        result
    }
    pub fn latest(&self) -> Option<Arc<BatchResult>> {
        self.history.back().cloned()
    }
    /// Up to `limit` results, newest first.
    pub fn history(&self, limit: usize) -> Vec<Arc<BatchResult>> {
        self.history.iter().rev().take(limit).cloned().collect()
    }
    /// Every retained result, oldest first.
    pub fn retained(&self) -> impl Iterator<Item = &Arc<BatchResult>> {
        self.history.iter()
    }
    pub fn counters(&self) -> SessionCounters {
        let elapsed = Local::now().naive_local() - self.start_time;
        SessionCounters {
            total_batches: self.total_batches,
            total_samples: self.total_samples,
            duration_seconds: (elapsed.num_milliseconds().max(0) as f64) / 1000.0,
        }
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::aggregate::{aggregate, ConfidenceMode, EegStats};
    use crate::analysis::classifier::Prediction;
    use crate::types::{ClassProbabilities, Emotion, Trend};
    fn result(batch_size: usize, alpha: f64) -> BatchResult {
        let p = Prediction {
            label: Emotion::Focus,
            probabilities: ClassProbabilities { fatigue: 0.1, focus: 0.8, relax: 0.1 },
        };
        let consensus = aggregate(&[p], ConfidenceMode::default()).unwrap();
        BatchResult::new(
            Local::now().naive_local(),
            batch_size,
            consensus,
            EegStats::from_bands([alpha, 0.3, 0.3], [Trend::Stable; 3]),
        )
    }
    #[test]
    fn capacity_evicts_oldest_and_history_is_newest_first() {
        let mut ledger = SessionLedger::new(3);
        for i in 0..4 {
            ledger.record(result(10, i as f64 / 10.0));
        }
        let history = ledger.history(3);
        let alphas: Vec<f64> = history.iter().map(|r| r.eeg_stats.alpha.avg).collect();
        assert_eq!(alphas, vec![0.3, 0.2, 0.1]);
        assert_eq!(ledger.history(10).len(), 3);
        assert_eq!(ledger.latest().unwrap().eeg_stats.alpha.avg, 0.3);
        assert_eq!(ledger.retained().count(), 3);
    }
    #[test]
    fn counters_sum_actual_batch_sizes() {
        let mut ledger = SessionLedger::new(2);
        ledger.record(result(10, 0.4));
        ledger.record(result(6, 0.4));
        ledger.record(result(10, 0.4));
        let counters = ledger.counters();
        assert_eq!(counters.total_batches, 3);
        assert_eq!(counters.total_samples, 26);
        assert!(counters.duration_seconds >= 0.0);
    }
    #[test]
    fn readers_see_published_snapshots() {
        let mut ledger = SessionLedger::new(5);
        let handle = ledger.handle();
        let before = handle.load();
        assert!(before.latest_result().is_none());
        ledger.record(result(10, 0.42));
        let reader = std::thread::spawn(move || handle.load());
        let after = reader.join().unwrap();
        assert_eq!(after.session_counters().total_batches, 1);
        assert_eq!(after.latest_result().unwrap().eeg_stats.alpha.avg, 0.42);
        assert_eq!(after.history(20).len(), 1);
        // the old snapshot is unchanged
        assert!(before.history(20).is_empty());
        assert_eq!(after.start_time(), ledger.start_time());
    }
}
