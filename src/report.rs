// src/report.rs
use chrono::NaiveDateTime;
use serde::Serialize;

use crate::analysis::aggregate::{BatchResult, EegStats};
use crate::analysis::ledger::{SessionCounters, SessionSnapshot};
use crate::types::{ClassProbabilities, Emotion};

/// How many past batches a history response carries by default.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SessionStats {
    pub total_batches: u64,
    pub total_samples: u64,
    pub session_duration: f64,
}

impl From<SessionCounters> for SessionStats {
    fn from(c: SessionCounters) -> Self {
        Self {
            total_batches: c.total_batches,
            total_samples: c.total_samples,
            session_duration: c.duration_seconds,
        }
    }
}

/// Latest analysis as served to polling clients.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LiveReport {
    pub timestamp: NaiveDateTime,
    pub dominant_emotion: Emotion,
    pub consistency: f64,
    pub avg_confidence: f64,
    pub probabilities: ClassProbabilities,
    pub eeg_stats: EegStats,
    pub session_stats: SessionStats,
}

impl LiveReport {
    pub fn new(result: &BatchResult, counters: SessionCounters) -> Self {
        Self {
            timestamp: result.timestamp,
            dominant_emotion: result.dominant_emotion,
            consistency: result.consistency,
            avg_confidence: result.avg_confidence,
            probabilities: result.probabilities,
            eeg_stats: result.eeg_stats,
            session_stats: counters.into(),
        }
    }

    /// `None` until the first batch has been recorded.
    pub fn from_snapshot(snapshot: &SessionSnapshot) -> Option<Self> {
        snapshot
            .latest_result()
            .map(|latest| Self::new(&latest, snapshot.session_counters()))
    }
}

/// Recent results in chronological order plus the session start.
#[derive(Clone, Debug, Serialize)]
pub struct HistoryReport {
    pub prediction_history: Vec<BatchResult>,
    pub start_time: NaiveDateTime,
}

impl HistoryReport {
    pub fn from_snapshot(snapshot: &SessionSnapshot, limit: usize) -> Self {
        let mut prediction_history: Vec<BatchResult> =
            snapshot.history(limit).iter().map(|r| (**r).clone()).collect();
        prediction_history.reverse();
        Self {
            prediction_history,
            start_time: snapshot.start_time(),
        }
    }
}

/// `{success, message?, data?}` envelope used by the web layer.
#[derive(Clone, Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, message: None, data: Some(data) }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { success: false, message: Some(message.into()), data: None }
    }
}

/// The live endpoint's answer, an error envelope until the first batch exists.
pub fn live_response(report: Option<LiveReport>) -> ApiResponse<LiveReport> {
    match report {
        Some(report) => ApiResponse::ok(report),
        None => ApiResponse::error("No analysis data available yet"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::aggregate::{aggregate, ConfidenceMode};
    use crate::analysis::classifier::Prediction;
    use crate::analysis::ledger::SessionLedger;
    use crate::types::Trend;

    fn record(ledger: &mut SessionLedger, label: Emotion) {
        let mut probabilities = ClassProbabilities { fatigue: 0.1, focus: 0.1, relax: 0.1 };
        probabilities.set(label, 0.8);
        let consensus = aggregate(&[Prediction { label, probabilities }], ConfidenceMode::default()).unwrap();
        let stats = EegStats::from_bands([0.4, 0.35, 0.25], [Trend::Stable; 3]);
        ledger.record(BatchResult::new(ledger.start_time(), 10, consensus, stats));
    }

    #[test]
    fn live_response_before_and_after_first_batch() {
        let mut ledger = SessionLedger::new(10);
        let empty = serde_json::to_value(live_response(LiveReport::from_snapshot(&ledger.handle().load()))).unwrap();
        assert_eq!(empty["success"], false);
        assert!(empty.get("data").is_none());
        record(&mut ledger, Emotion::Relax);
        let json = serde_json::to_value(live_response(LiveReport::from_snapshot(&ledger.handle().load()))).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["dominant_emotion"], "relax");
        assert_eq!(json["data"]["session_stats"]["total_samples"], 10);
        assert_eq!(json["data"]["eeg_stats"]["alpha"]["trend"], "stable");
        assert!(json.get("message").is_none());
    }

    #[test]
    fn history_report_is_chronological_and_limited() {
        let mut ledger = SessionLedger::new(50);
        for label in [Emotion::Focus, Emotion::Relax, Emotion::Fatigue] {
            record(&mut ledger, label);
        }
        let report = HistoryReport::from_snapshot(&ledger.handle().load(), 2);
        let labels: Vec<Emotion> = report.prediction_history.iter().map(|r| r.dominant_emotion).collect();
        assert_eq!(labels, vec![Emotion::Relax, Emotion::Fatigue]);
        assert_eq!(report.start_time, ledger.start_time());
    }
}
