// src/advice.rs
use serde::Serialize;

use crate::types::Emotion;

/// Theta average above which a relaxed reading counts as drowsy.
const DROWSY_THETA: f64 = 0.35;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Good,
    Caution,
    Alert,
}

impl Severity {
    pub fn marker(&self) -> &'static str {
        match self {
            Severity::Good => "🟢",
            Severity::Caution => "🟡",
            Severity::Alert => "🔴",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Advice {
    pub severity: Severity,
    pub headline: &'static str,
    pub actions: Vec<&'static str>,
}

pub fn recommend(emotion: Emotion, confidence: f64, theta_avg: f64) -> Advice {
    let (severity, headline, actions) = match emotion {
        Emotion::Fatigue if confidence > 0.5 => (
            Severity::Alert,
            "HIGH FATIGUE - take immediate action",
            vec![
                "Stop current tasks and take a break",
                "Consider a 15-20 minute power nap",
                "Hydrate and get fresh air",
            ],
        ),
        Emotion::Fatigue => (
            Severity::Caution,
            "MODERATE FATIGUE - consider",
            vec!["Light stretching or movement", "Stay hydrated", "Monitor your state"],
        ),
        Emotion::Focus => (
            Severity::Good,
            "GOOD FOCUS STATE",
            vec![
                "Continue with cognitive tasks",
                "Maintain current environment",
                "Stay hydrated",
            ],
        ),
        Emotion::Relax if theta_avg > DROWSY_THETA => (
            Severity::Caution,
            "RELAXED BUT DROWSY",
            vec!["Light activity to maintain alertness", "Consider if rest is needed"],
        ),
        Emotion::Relax => (
            Severity::Good,
            "CALM AND ALERT",
            vec!["Good state for learning or creativity", "Maintain current conditions"],
        ),
    };
    Advice { severity, headline, actions }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatigue_severity_depends_on_confidence() {
        assert_eq!(recommend(Emotion::Fatigue, 0.8, 0.3).severity, Severity::Alert);
        assert_eq!(recommend(Emotion::Fatigue, 0.5, 0.3).severity, Severity::Caution);
    }

    #[test]
    fn relax_turns_to_caution_when_theta_is_high() {
        assert_eq!(recommend(Emotion::Relax, 0.9, 0.36).headline, "RELAXED BUT DROWSY");
        let calm = recommend(Emotion::Relax, 0.9, 0.2);
        assert_eq!(calm.severity, Severity::Good);
        assert_eq!(calm.actions.len(), 2);
    }

    #[test]
    fn focus_is_always_good() {
        assert_eq!(recommend(Emotion::Focus, 0.1, 0.9).severity, Severity::Good);
    }
}
