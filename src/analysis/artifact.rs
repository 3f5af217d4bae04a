use std::collections::VecDeque;
use log::debug;
use serde::Deserialize;
use crate::brain_utils::WindowBuffer;
use crate::types::{Band, Sample};
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ArtifactSettings {
    /// Relative distance from the baseline above which a sample is an artifact.
    pub deviation_threshold: f64,
    pub warmup_samples: usize,
    pub baseline_window: usize,
    /// Number of recent decisions the rejection-rate cap looks at.
    pub rate_window: usize,
    pub max_rejection_rate: f64,
}
impl Default for ArtifactSettings {
    fn default() -> Self {
        Self {
            deviation_threshold: 0.35,
            warmup_samples: 5,
            baseline_window: 20,
            rate_window: 20,
            max_rejection_rate: 0.70,
        }
    }
}
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RejectReason {
    NonFinite,
    OutOfRange,
    Deviation(f64),
}
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Verdict {
    Accepted,
    Rejected(RejectReason),
    /// Would have been rejected, but the rejection rate is already at its cap.
    ForcedAccept,
}
impl Verdict {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Verdict::Rejected(_))
    }
}
/// A sample that made it through the artifact filter.
#[derive(Clone, Debug, PartialEq)]
pub struct FilteredSample(Sample);
impl FilteredSample {
    pub fn sample(&self) -> &Sample {
        &self.0
    }
    #[cfg(test)]
    pub(crate) fn assume_clean(sample: Sample) -> Self {
        FilteredSample(sample)
    }
}
/// `accepted` includes forced accepts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub inspected: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub forced: u64,
}
/// Drops blink and motion artifacts by comparing each sample with a rolling
/// baseline of previously accepted samples.
pub struct ArtifactFilter {
    settings: ArtifactSettings,
    baseline: [WindowBuffer; 3],
    decisions: VecDeque<bool>, // true = rejected
    stats: FilterStats,
}
impl ArtifactFilter {
    pub fn new(settings: ArtifactSettings) -> Self {
        let window = settings.baseline_window.max(settings.warmup_samples).max(1);
        Self {
            baseline: [
                WindowBuffer::new(window),
                WindowBuffer::new(window),
                WindowBuffer::new(window),
            ],
            decisions: VecDeque::with_capacity(settings.rate_window.max(1)),
            settings,
            stats: FilterStats::default(),
        }
    }
    pub fn stats(&self) -> FilterStats {
        self.stats
    }
    /// Judges one sample and updates the baseline and counters.
    pub fn inspect(&mut self, sample: &Sample) -> Verdict {
        self.stats.inspected += 1;
        // implausible values are never forced through, even at the cap
        let implausible = if !sample.is_finite() {
            Some(RejectReason::NonFinite)
        } else if !sample.in_unit_range() {
            Some(RejectReason::OutOfRange)
        } else {
            None
        };
        if let Some(reason) = implausible {
            self.record_decision(true);
            self.stats.rejected += 1;
            return Verdict::Rejected(reason);
        }
        let verdict = match self.candidate_reason(sample) {
            None => Verdict::Accepted,
            Some(reason) if self.rejection_would_exceed_cap() => {
                debug!("artifact cap reached, accepting sample flagged as {reason:?}");
                Verdict::ForcedAccept
            }
            Some(reason) => Verdict::Rejected(reason),
        };
        match verdict {
            Verdict::Rejected(_) => {
                self.record_decision(true);
                self.stats.rejected += 1;
            }
            Verdict::ForcedAccept => {
                self.record_decision(false);
                self.stats.accepted += 1;
                self.stats.forced += 1;
                self.absorb(sample);
            }
            Verdict::Accepted => {
                self.record_decision(false);
                self.stats.accepted += 1;
                self.absorb(sample);
            }
        }
        verdict
    }
    pub fn filter(&mut self, sample: Sample) -> Option<FilteredSample> {
        if self.inspect(&sample).is_accepted() {
            Some(FilteredSample(sample))
        } else {
            None
        }
    }
    fn candidate_reason(&self, sample: &Sample) -> Option<RejectReason> {
        if self.baseline[0].len() < self.settings.warmup_samples {
            return None;
        }
        let deviation = self.relative_deviation(sample)?;
        (deviation > self.settings.deviation_threshold).then_some(RejectReason::Deviation(deviation))
    }
    fn relative_deviation(&self, sample: &Sample) -> Option<f64> {
        let mut dist_sq = 0.0;
        let mut norm_sq = 0.0;
        for band in Band::ALL {
            let mean = self.baseline[band.index()].mean()?;
            let diff = sample.band(band) - mean;
            dist_sq += diff * diff;
            norm_sq += mean * mean;
        }
        let norm = norm_sq.sqrt();
        if norm <= f64::EPSILON {
            return Some(dist_sq.sqrt());
        }
        Some(dist_sq.sqrt() / norm)
    }
    fn rejection_would_exceed_cap(&self) -> bool {
        let capacity = self.settings.rate_window.max(1);
        let mut rejected = self.decisions.iter().filter(|r| **r).count() + 1;
        let mut total = self.decisions.len() + 1;
        if self.decisions.len() == capacity {
            // the oldest decision falls out of the window
            if self.decisions.front().copied().unwrap_or(false) {
                rejected -= 1;
            }
            total -= 1;
        }
        rejected as f64 / total as f64 > self.settings.max_rejection_rate
    }
    fn record_decision(&mut self, rejected: bool) {
        if self.decisions.len() == self.settings.rate_window.max(1) {
            self.decisions.pop_front();
        }
        self.decisions.push_back(rejected);
    }
    fn absorb(&mut self, sample: &Sample) {
        for band in Band::ALL {
            self.baseline[band.index()].push(sample.band(band));
        }
    }
}
