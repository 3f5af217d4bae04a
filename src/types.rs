// src/types.rs
use std::fmt;
use std::sync::Arc;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use crate::analysis::aggregate::BatchResult;
use crate::analysis::ledger::SessionCounters;
use crate::report::{HistoryReport, LiveReport};

/// The three mental states the classifier distinguishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Focus,
    Relax,
    Fatigue,
}

impl Emotion {
    /// Canonical order, also the final tie-break order when aggregating.
    pub const ALL: [Emotion; 3] = [Emotion::Focus, Emotion::Relax, Emotion::Fatigue];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Focus => "focus",
            Emotion::Relax => "relax",
            Emotion::Fatigue => "fatigue",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "focus" => Some(Emotion::Focus),
            "relax" => Some(Emotion::Relax),
            "fatigue" => Some(Emotion::Fatigue),
            _ => None,
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// EEG frequency bands carried by every sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Alpha,
    Beta,
    Theta,
}

impl Band {
    pub const ALL: [Band; 3] = [Band::Alpha, Band::Beta, Band::Theta];

    pub fn index(&self) -> usize {
        match self {
            Band::Alpha => 0,
            Band::Beta => 1,
            Band::Theta => 2,
        }
    }

    /// Frequency range in Hz, lower bound inclusive.
    pub fn range_hz(&self) -> (f64, f64) {
        match self {
            Band::Theta => (4.0, 8.0),
            Band::Alpha => (8.0, 13.0),
            Band::Beta => (13.0, 30.0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

impl Trend {
    pub fn arrow(&self) -> &'static str {
        match self {
            Trend::Increasing => "↗",
            Trend::Decreasing => "↘",
            Trend::Stable => "→",
        }
    }
}

/// One band-power reading as produced by the headband.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: NaiveDateTime,
    pub alpha: f64,
    pub beta: f64,
    pub theta: f64,
}

impl Sample {
    pub fn new(timestamp: NaiveDateTime, alpha: f64, beta: f64, theta: f64) -> Self {
        Self { timestamp, alpha, beta, theta }
    }

    pub fn band(&self, band: Band) -> f64 {
        match band {
            Band::Alpha => self.alpha,
            Band::Beta => self.beta,
            Band::Theta => self.theta,
        }
    }

    /// Bands in `Band::ALL` order.
    pub fn bands(&self) -> [f64; 3] {
        [self.alpha, self.beta, self.theta]
    }

    pub fn is_finite(&self) -> bool {
        self.bands().iter().all(|v| v.is_finite())
    }

    pub fn in_unit_range(&self) -> bool {
        self.bands().iter().all(|v| (0.0..=1.0).contains(v))
    }
}

/// Per-class probability table, serialized as `{fatigue, focus, relax}`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassProbabilities {
    pub fatigue: f64,
    pub focus: f64,
    pub relax: f64,
}

impl ClassProbabilities {
    pub fn get(&self, emotion: Emotion) -> f64 {
        match emotion {
            Emotion::Focus => self.focus,
            Emotion::Relax => self.relax,
            Emotion::Fatigue => self.fatigue,
        }
    }

    pub fn set(&mut self, emotion: Emotion, value: f64) {
        match emotion {
            Emotion::Focus => self.focus = value,
            Emotion::Relax => self.relax = value,
            Emotion::Fatigue => self.fatigue = value,
        }
    }

    pub fn sum(&self) -> f64 {
        self.fatigue + self.focus + self.relax
    }

    /// Highest probability and its label; equal values resolve in canonical order.
    pub fn max(&self) -> (Emotion, f64) {
        let mut best = (Emotion::Focus, self.focus);
        for emotion in [Emotion::Relax, Emotion::Fatigue] {
            let p = self.get(emotion);
            if p > best.1 {
                best = (emotion, p);
            }
        }
        best
    }

    /// Entries sorted by probability, highest first.
    pub fn ranked(&self) -> Vec<(Emotion, f64)> {
        let mut entries: Vec<(Emotion, f64)> =
            Emotion::ALL.iter().map(|e| (*e, self.get(*e))).collect();
        entries.sort_by(|a, b| b.1.total_cmp(&a.1));
        entries
    }
}

// Commands accepted by the engine thread.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineCommand {
    Pause,
    Resume,
    Status,
    History(usize),
    Shutdown,
}

// Everything the engine consumes arrives on one channel.
#[derive(Clone, Debug)]
pub enum EngineInput {
    Cycle(Vec<Sample>),
    Command(EngineCommand),
}

// Engine -> console.
#[derive(Clone, Debug)]
pub enum MonitorEvent {
    BatchReady(Arc<BatchResult>, SessionCounters),
    CycleEmpty,
    CycleSummary { accepted: usize, rejected: usize, discarded: usize },
    BatchSkipped(String),
    Status(Option<LiveReport>),
    History(HistoryReport),
    Paused(bool),
    Stopped,
}
