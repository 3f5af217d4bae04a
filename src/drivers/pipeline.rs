use std::sync::Arc;
use chrono::Local;
use log::{debug, error};
use serde::Deserialize;
use crate::analysis::{
    aggregate, ArtifactFilter, ArtifactSettings, Batch, BatchResult, Batcher, Classifier,
    ConfidenceMode, EegStats, FilterStats, SessionCounters, SessionLedger, SnapshotHandle,
    TrendTracker,
};
use crate::drivers::PipelineError;
use crate::types::Sample;
/// What to do when a stage receives data that breaks its contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationPolicy {
    /// Stop with the error.
    Fail,
    /// Log it, drop the batch and carry on.
    Skip,
}
impl Default for ViolationPolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            ViolationPolicy::Fail
        } else {
            ViolationPolicy::Skip
        }
    }
}
#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub artifact: ArtifactSettings,
    pub batch_size: usize,
    pub min_batch_size: usize,
    pub trend_window: usize,
    pub trend_epsilon: f64,
    pub history_capacity: usize,
    pub confidence_mode: ConfidenceMode,
    pub on_contract_violation: ViolationPolicy,
}
impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            artifact: ArtifactSettings::default(),
            batch_size: 10,
            min_batch_size: 5,
            trend_window: 3,
            trend_epsilon: 0.01,
            history_capacity: 100,
            confidence_mode: ConfidenceMode::default(),
            on_contract_violation: ViolationPolicy::default(),
        }
    }
}
/// A batch result with the session counters as they stood right after it was recorded.
#[derive(Clone, Debug)]
pub struct RecordedBatch {
    pub result: Arc<BatchResult>,
    pub counters: SessionCounters,
}
/// Everything one fetch cycle produced.
#[derive(Clone, Debug, Default)]
pub struct CycleOutcome {
    pub accepted: usize,
    pub rejected: usize,
    /// Samples dropped because the window closed on a too-short remainder.
    pub discarded: usize,
    pub batches: Vec<RecordedBatch>,
    /// Reasons for batches dropped under `ViolationPolicy::Skip`.
    pub skipped: Vec<String>,
}
/// Artifact filter -> batcher -> features -> classifier -> aggregate -> ledger.
pub struct EmotionPipeline<C: Classifier> {
    filter: ArtifactFilter,
    batcher: Batcher,
    classifier: C,
    trend: TrendTracker,
    ledger: SessionLedger,
    confidence_mode: ConfidenceMode,
    policy: ViolationPolicy,
}
impl<C: Classifier> EmotionPipeline<C> {
    pub fn new(classifier: C, settings: PipelineSettings) -> Self {
        Self {
            filter: ArtifactFilter::new(settings.artifact),
            batcher: Batcher::new(settings.batch_size, settings.min_batch_size),
            classifier,
            trend: TrendTracker::new(settings.trend_window, settings.trend_epsilon),
            ledger: SessionLedger::new(settings.history_capacity),
            confidence_mode: settings.confidence_mode,
            policy: settings.on_contract_violation,
        }
    }
    pub fn classifier(&self) -> &C {
        &self.classifier
    }
    pub fn ledger(&self) -> &SessionLedger {
        &self.ledger
    }
    pub fn snapshot_handle(&self) -> SnapshotHandle {
        self.ledger.handle()
    }
    pub fn filter_stats(&self) -> FilterStats {
        self.filter.stats()
    }
    /// Runs one fetch window's samples through every stage, then closes the window.
    pub fn ingest_cycle(&mut self, samples: Vec<Sample>) -> Result<CycleOutcome, PipelineError> {
        let mut outcome = CycleOutcome::default();
        for sample in samples {
            match self.filter.filter(sample) {
                Some(clean) => {
                    outcome.accepted += 1;
                    if let Some(batch) = self.batcher.accept(clean) {
                        self.settle(batch, &mut outcome)?;
                    }
                }
                None => outcome.rejected += 1,
            }
        }
        let discarded_before = self.batcher.discarded_total();
        if let Some(batch) = self.batcher.seal_window() {
            self.settle(batch, &mut outcome)?;
        }
        outcome.discarded = (self.batcher.discarded_total() - discarded_before) as usize;
        Ok(outcome)
    }
    fn settle(&mut self, batch: Batch, outcome: &mut CycleOutcome) -> Result<(), PipelineError> {
        match self.process_batch(&batch) {
            Ok(result) => outcome.batches.push(RecordedBatch {
                result,
                counters: self.ledger.counters(),
            }),
            Err(e) if e.is_contract_violation() && self.policy == ViolationPolicy::Skip => {
                error!("dropping batch of {} samples: {e}", batch.len());
                outcome.skipped.push(e.to_string());
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }
    /// Classifies a sealed batch and records the result. Nothing is mutated on error.
    pub fn process_batch(&mut self, batch: &Batch) -> Result<Arc<BatchResult>, PipelineError> {
        let layout = self.classifier.layout();
        let predictions = batch
            .samples()
            .iter()
            .map(|s| self.classifier.predict(&layout.expand(s.sample())))
            .collect::<Result<Vec<_>, _>>()?;
        let consensus = aggregate(&predictions, self.confidence_mode)?;
        let avgs = batch.band_means();
        let trends = self.trend.update_all(avgs);
        let timestamp = batch
            .samples()
            .last()
            .map(|s| s.sample().timestamp)
            .unwrap_or_else(|| Local::now().naive_local());
        let result = BatchResult::new(timestamp, batch.len(), consensus, EegStats::from_bands(avgs, trends));
        debug!(
            "batch of {} ({:?}): {} at {:.0}% consistency",
            batch.len(),
            batch.reason(),
            result.dominant_emotion,
            result.consistency * 100.0
        );
        Ok(self.ledger.record(result))
    }
}
/// Test sample `offset_ms` after a fixed session start.
#[cfg(test)]
pub(crate) fn sample_at(offset_ms: i64, alpha: f64, beta: f64, theta: f64) -> Sample {
    let base = chrono::NaiveDate::from_ymd_opt(2025, 5, 31)
        .and_then(|d| d.and_hms_opt(11, 0, 0))
        .expect("valid base timestamp");
    Sample::new(base + chrono::Duration::milliseconds(offset_ms), alpha, beta, theta)
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::classifier::Prediction;
    use crate::analysis::features::{FeatureLayout, FeatureVector, DEFAULT_LAYOUT};
    use crate::analysis::EmotionClassifier;
    use crate::drivers::source::{ManualSource, SampleSource};
    use crate::types::{ClassProbabilities, Emotion, Trend};
    /// Calls fatigue whenever theta outweighs alpha.
    struct ThetaVsAlpha;
    impl Classifier for ThetaVsAlpha {
        fn predict(&self, features: &FeatureVector) -> Result<Prediction, PipelineError> {
            let theta_alpha = features.values()[9];
            Ok(if theta_alpha > 1.0 {
                Prediction {
                    label: Emotion::Fatigue,
                    probabilities: ClassProbabilities { fatigue: 0.8, focus: 0.1, relax: 0.1 },
                }
            } else {
                Prediction {
                    label: Emotion::Focus,
                    probabilities: ClassProbabilities { fatigue: 0.1, focus: 0.8, relax: 0.1 },
                }
            })
        }
        fn layout(&self) -> &FeatureLayout {
            &DEFAULT_LAYOUT
        }
    }
    /// Always reports a malformed vector.
    struct Misshapen;
    impl Classifier for Misshapen {
        fn predict(&self, features: &FeatureVector) -> Result<Prediction, PipelineError> {
            Err(PipelineError::FeatureShape {
                expected: features.len() + 1,
                actual: features.len(),
            })
        }
        fn layout(&self) -> &FeatureLayout {
            &DEFAULT_LAYOUT
        }
    }
    fn shipped_model() -> EmotionClassifier {
        EmotionClassifier::load(concat!(env!("CARGO_MANIFEST_DIR"), "/models/emotion_forest.json")).unwrap()
    }
    fn repeated(n: i64, alpha: f64, beta: f64, theta: f64) -> Vec<Sample> {
        (0..n).map(|i| sample_at(i * 40, alpha, beta, theta)).collect()
    }
    #[test]
    fn steady_signal_yields_one_consistent_batch() {
        let mut pipeline = EmotionPipeline::new(shipped_model(), PipelineSettings::default());
        let outcome = pipeline.ingest_cycle(repeated(10, 0.42, 0.33, 0.25)).unwrap();
        assert_eq!(outcome.accepted, 10);
        assert_eq!(outcome.batches.len(), 1);
        let result = &outcome.batches[0].result;
        assert_eq!(result.batch_size, 10);
        assert_eq!(result.consistency, 1.0);
        assert!((result.eeg_stats.alpha.avg - 0.42).abs() < 1e-9);
        assert_eq!(result.eeg_stats.alpha.trend, Trend::Stable);
        assert!((result.probabilities.sum() - 1.0).abs() < 1e-6);
        let snapshot = pipeline.snapshot_handle().load();
        assert_eq!(snapshot.session_counters().total_samples, 10);
        assert_eq!(snapshot.latest_result().as_deref(), Some(&**result));
    }
    #[test]
    fn mixed_batch_reports_majority_and_consistency() {
        let mut samples = repeated(7, 0.30, 0.30, 0.40);
        samples.extend((7..10).map(|i| sample_at(i * 40, 0.36, 0.30, 0.34)));
        let mut pipeline = EmotionPipeline::new(ThetaVsAlpha, PipelineSettings::default());
        let outcome = pipeline.ingest_cycle(samples).unwrap();
        let result = &outcome.batches[0].result;
        assert_eq!(result.dominant_emotion, Emotion::Fatigue);
        assert!((result.consistency - 0.7).abs() < 1e-12);
        assert_eq!(result.emotion_counts.focus, 3);
    }
    #[test]
    fn artifact_heavy_input_keeps_batches_flowing() {
        let mut samples = repeated(10, 0.42, 0.33, 0.25);
        samples.extend((10..100).map(|i| sample_at(i * 40, 0.05, 0.05, 0.90)));
        let mut pipeline = EmotionPipeline::new(ThetaVsAlpha, PipelineSettings::default());
        let mut source = ManualSource::new(samples.chunks(10).map(|c| c.to_vec()));
        let mut batches = 0;
        while source.remaining() > 0 {
            let cycle = source.get_recent_samples().unwrap();
            batches += pipeline.ingest_cycle(cycle).unwrap().batches.len();
        }
        assert!(batches >= 3, "only {batches} batches");
        assert!(pipeline.filter_stats().forced > 0);
        assert_eq!(pipeline.ledger().counters().total_batches as usize, batches);
    }
    #[test]
    fn short_windows_emit_or_discard() {
        let mut pipeline = EmotionPipeline::new(ThetaVsAlpha, PipelineSettings::default());
        let short = pipeline.ingest_cycle(repeated(6, 0.42, 0.33, 0.25)).unwrap();
        assert_eq!(short.batches.len(), 1);
        assert_eq!(short.batches[0].result.batch_size, 6);
        let tiny = pipeline.ingest_cycle(repeated(3, 0.42, 0.33, 0.25)).unwrap();
        assert!(tiny.batches.is_empty());
        assert_eq!(tiny.discarded, 3);
        let counters = pipeline.ledger().counters();
        assert_eq!((counters.total_batches, counters.total_samples), (1, 6));
    }
    #[test]
    fn each_batch_carries_its_own_counters() {
        let mut pipeline = EmotionPipeline::new(ThetaVsAlpha, PipelineSettings::default());
        let outcome = pipeline.ingest_cycle(repeated(16, 0.42, 0.33, 0.25)).unwrap();
        assert_eq!(outcome.batches.len(), 2);
        let full = &outcome.batches[0];
        assert_eq!(full.result.batch_size, 10);
        assert_eq!((full.counters.total_batches, full.counters.total_samples), (1, 10));
        let short = &outcome.batches[1];
        assert_eq!(short.result.batch_size, 6);
        assert_eq!((short.counters.total_batches, short.counters.total_samples), (2, 16));
    }
    #[test]
    fn empty_cycle_changes_nothing() {
        let mut pipeline = EmotionPipeline::new(ThetaVsAlpha, PipelineSettings::default());
        let outcome = pipeline.ingest_cycle(Vec::new()).unwrap();
        assert_eq!(outcome.accepted + outcome.rejected + outcome.discarded, 0);
        assert!(pipeline.ledger().latest().is_none());
    }
    #[test]
    fn contract_violations_follow_policy() {
        let skip = PipelineSettings {
            on_contract_violation: ViolationPolicy::Skip,
            ..PipelineSettings::default()
        };
        let mut lenient = EmotionPipeline::new(Misshapen, skip);
        let outcome = lenient.ingest_cycle(repeated(10, 0.42, 0.33, 0.25)).unwrap();
        assert!(outcome.batches.is_empty());
        assert_eq!(outcome.skipped.len(), 1);
        assert!(lenient.ledger().latest().is_none());
        let fail = PipelineSettings {
            on_contract_violation: ViolationPolicy::Fail,
            ..PipelineSettings::default()
        };
        let mut strict = EmotionPipeline::new(Misshapen, fail);
        let err = strict.ingest_cycle(repeated(10, 0.42, 0.33, 0.25)).unwrap_err();
        assert!(matches!(err, PipelineError::FeatureShape { .. }));
    }
    #[test]
    fn negative_band_power_never_reaches_the_model() {
        let json = serde_json::json!({
            "classes": ["focus", "relax", "fatigue"],
            "features": ["theta_amplitude", "spectral_complexity"],
            "scaler": { "data_min": [0.0, 0.0], "data_max": [80.0, 2.0] },
            "model": {
                "kind": "softmax",
                "weights": [[-2.0, 1.0], [0.0, 0.0], [2.0, -1.0]],
                "bias": [0.0, 0.0, 0.0]
            }
        });
        let model = EmotionClassifier::from_artifact(serde_json::from_value(json).unwrap()).unwrap();
        let mut pipeline = EmotionPipeline::new(model, PipelineSettings::default());
        let outcome = pipeline.ingest_cycle(repeated(5, 0.5, 0.6, -0.1)).unwrap();
        assert_eq!((outcome.accepted, outcome.rejected), (0, 5));
        assert!(outcome.batches.is_empty());
        assert!(pipeline.ledger().latest().is_none());
        let outcome = pipeline.ingest_cycle(repeated(5, 0.5, 0.3, 0.2)).unwrap();
        let result = &outcome.batches[0].result;
        assert!((result.probabilities.sum() - 1.0).abs() < 1e-6);
        assert!(result.eeg_stats.theta.avg >= 0.0);
    }
    #[test]
    fn trends_follow_consecutive_batches() {
        let mut pipeline = EmotionPipeline::new(ThetaVsAlpha, PipelineSettings::default());
        pipeline.ingest_cycle(repeated(10, 0.40, 0.35, 0.25)).unwrap();
        let outcome = pipeline.ingest_cycle(repeated(10, 0.45, 0.33, 0.22)).unwrap();
        let stats = outcome.batches[0].result.eeg_stats;
        assert_eq!(stats.alpha.trend, Trend::Increasing);
        assert_eq!(stats.beta.trend, Trend::Decreasing);
        assert_eq!(stats.theta.trend, Trend::Decreasing);
    }
}
