use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use crate::analysis::classifier::Prediction;
use crate::drivers::PipelineError;
use crate::types::{Band, ClassProbabilities, Emotion, Trend};
/// How a batch's average confidence is computed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceMode {
    /// Mean of every prediction's top probability.
    #[default]
    MaxProbability,
    /// Mean probability of the dominant label over the predictions that chose it.
    DominantLabel,
}
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmotionCounts {
    pub fatigue: usize,
    pub focus: usize,
    pub relax: usize,
}
impl EmotionCounts {
    pub fn get(&self, emotion: Emotion) -> usize {
        match emotion {
            Emotion::Focus => self.focus,
            Emotion::Relax => self.relax,
            Emotion::Fatigue => self.fatigue,
        }
    }
    fn bump(&mut self, emotion: Emotion) {
        match emotion {
            Emotion::Focus => self.focus += 1,
            Emotion::Relax => self.relax += 1,
            Emotion::Fatigue => self.fatigue += 1,
        }
    }}
/// Batch-level verdict before timestamps and band statistics are attached.
#[derive(Clone, Debug, PartialEq)]
pub struct Consensus {
    pub dominant: Emotion,
    pub consistency: f64,
    pub avg_confidence: f64,
    pub probabilities: ClassProbabilities,
    pub counts: EmotionCounts,
}
pub fn aggregate(predictions: &[Prediction], mode: ConfidenceMode) -> Result<Consensus, PipelineError> {
    if predictions.is_empty() {
        return Err(PipelineError::EmptyBatch);
    }
    let n = predictions.len() as f64;
    let mut counts = EmotionCounts::default();
    let mut mass = ClassProbabilities::default();
    for p in predictions {
        counts.bump(p.label);
        for emotion in Emotion::ALL {
            mass.set(emotion, mass.get(emotion) + p.probabilities.get(emotion));
        }
    }
    // most votes, then most probability mass, then canonical order
    let mut dominant = Emotion::ALL[0];
    for emotion in Emotion::ALL.into_iter().skip(1) {
        let (c, best_c) = (counts.get(emotion), counts.get(dominant));
        if c > best_c || (c == best_c && mass.get(emotion) > mass.get(dominant)) {
            dominant = emotion;
        }
    }
    let agreeing = counts.get(dominant);
    let avg_confidence = match mode {
        ConfidenceMode::MaxProbability => {
            predictions.iter().map(|p| p.probabilities.max().1).sum::<f64>() / n
        }
        ConfidenceMode::DominantLabel => {
            let chosen: Vec<f64> = predictions
                .iter()
                .filter(|p| p.label == dominant)
                .map(|p| p.probabilities.get(dominant))
                .collect();
            if chosen.is_empty() {
                0.0
            } else {
                chosen.iter().sum::<f64>() / chosen.len() as f64
            }
        }
    };
    // equals n for well-formed predictions; dividing by it keeps the mean summing to 1
    let total = mass.sum();
    let scale = if total > 0.0 { total } else { n };
    let mut probabilities = ClassProbabilities::default();
    for emotion in Emotion::ALL {
        probabilities.set(emotion, mass.get(emotion) / scale);
    }
    Ok(Consensus {
        dominant,
        consistency: agreeing as f64 / n,
        avg_confidence,
        probabilities,
        counts,
    })
}
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BandStat {
    pub avg: f64,
    pub trend: Trend,
}
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct EegStats {
    pub alpha: BandStat,
    pub beta: BandStat,
    pub theta: BandStat,
}
impl EegStats {
    pub fn from_bands(avgs: [f64; 3], trends: [Trend; 3]) -> Self {
        let stat = |band: Band| BandStat {
            avg: avgs[band.index()],
            trend: trends[band.index()],
        };
        Self {
            alpha: stat(Band::Alpha),
            beta: stat(Band::Beta),
            theta: stat(Band::Theta),
        }
    }
    pub fn get(&self, band: Band) -> &BandStat {
        match band {
            Band::Alpha => &self.alpha,
            Band::Beta => &self.beta,
            Band::Theta => &self.theta,
        }
    }
}
/// One analysed batch as it is kept in the session history.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatchResult {
    pub timestamp: NaiveDateTime,
    pub batch_size: usize,
    pub dominant_emotion: Emotion,
    pub consistency: f64,
    pub avg_confidence: f64,
    pub probabilities: ClassProbabilities,
    pub emotion_counts: EmotionCounts,
    pub eeg_stats: EegStats,
}
impl BatchResult {
    pub fn new(timestamp: NaiveDateTime, batch_size: usize, consensus: Consensus, eeg_stats: EegStats) -> Self {
        Self {
            timestamp,
            batch_size,
            dominant_emotion: consensus.dominant,
            consistency: consensus.consistency,
            avg_confidence: consensus.avg_confidence,
            probabilities: consensus.probabilities,
            emotion_counts: consensus.counts,
            eeg_stats,
        }
    }
    /// Number of samples that agreed with the dominant label.
    pub fn agreeing(&self) -> usize {
        self.emotion_counts.get(self.dominant_emotion)
    }
}
