// src/console.rs
use std::fmt::Write;

use crate::advice::recommend;
use crate::analysis::aggregate::BatchResult;
use crate::analysis::ledger::SessionCounters;
use crate::report::DEFAULT_HISTORY_LIMIT;
use crate::types::{Band, Emotion, EngineCommand};

const BAR_WIDTH: usize = 20;

fn emoji(emotion: Emotion) -> &'static str {
    match emotion {
        Emotion::Focus => "🎯",
        Emotion::Relax => "😌",
        Emotion::Fatigue => "😴",
    }
}

fn band_caption(band: Band) -> &'static str {
    match band {
        Band::Alpha => "Alpha (Relaxation)",
        Band::Beta => "Beta (Focus)",
        Band::Theta => "Theta (Drowsiness)",
    }
}

fn bar(p: f64) -> String {
    let filled = ((p.clamp(0.0, 1.0) * BAR_WIDTH as f64) as usize).min(BAR_WIDTH);
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

fn capitalized(emotion: Emotion) -> String {
    let name = emotion.as_str();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Multi-line panel for one analysed batch.
pub fn render_batch(result: &BatchResult, counters: &SessionCounters) -> String {
    let mut out = String::new();
    let rule = "=".repeat(60);
    let emotion = result.dominant_emotion;
    // writing into a String cannot fail
    let _ = writeln!(out, "\n{rule}");
    let _ = writeln!(out, "🧠 REAL-TIME EEG ANALYSIS - {}", result.timestamp.format("%H:%M:%S"));
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(
        out,
        "🎯 CURRENT STATE: {} {}",
        emoji(emotion),
        emotion.as_str().to_uppercase()
    );
    let _ = writeln!(
        out,
        "📊 Consistency: {:.1}% ({}/{} samples)",
        result.consistency * 100.0,
        result.agreeing(),
        result.batch_size
    );
    let _ = writeln!(out, "🎪 Confidence: {:.1}%", result.avg_confidence * 100.0);

    let _ = writeln!(out, "\n📈 PROBABILITY BREAKDOWN:");
    for (label, p) in result.probabilities.ranked() {
        let _ = writeln!(out, "   {:8}: {} {:.1}%", capitalized(label), bar(p), p * 100.0);
    }

    let _ = writeln!(out, "\n🌊 EEG BAND ANALYSIS:");
    for band in [Band::Alpha, Band::Beta, Band::Theta] {
        let stat = result.eeg_stats.get(band);
        let _ = writeln!(
            out,
            "   {:20}: {:.3} {}",
            band_caption(band),
            stat.avg,
            stat.trend.arrow()
        );
    }

    let advice = recommend(emotion, result.avg_confidence, result.eeg_stats.theta.avg);
    let _ = writeln!(out, "\n💡 RECOMMENDATIONS:");
    let _ = writeln!(out, "   {} {}:", advice.severity.marker(), advice.headline);
    for action in &advice.actions {
        let _ = writeln!(out, "      • {action}");
    }

    let _ = writeln!(out, "\n📊 SESSION STATS:");
    let _ = writeln!(out, "   Total Batches: {}", counters.total_batches);
    let _ = writeln!(out, "   Total Samples: {}", counters.total_samples);
    let _ = write!(out, "   Session Duration: {:.0} seconds", counters.duration_seconds);
    out
}

/// One line per past batch, as listed by the `history` command.
pub fn render_history_line(result: &BatchResult) -> String {
    format!(
        "{}  {} {:<8} consistency {:>5.1}%  confidence {:>5.1}%  n={}",
        result.timestamp.format("%H:%M:%S"),
        emoji(result.dominant_emotion),
        result.dominant_emotion.as_str(),
        result.consistency * 100.0,
        result.avg_confidence * 100.0,
        result.batch_size
    )
}

pub const COMMAND_HELP: &str = "commands: status | history [n] | pause | resume | quit";

/// Parses one line typed at the console.
pub fn parse_command(line: &str) -> Result<EngineCommand, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err(COMMAND_HELP.to_owned());
    };
    let command = match verb.to_ascii_lowercase().as_str() {
        "status" | "s" => EngineCommand::Status,
        "history" | "h" => match words.next() {
            None => EngineCommand::History(DEFAULT_HISTORY_LIMIT),
            Some(n) => EngineCommand::History(
                n.parse().map_err(|_| format!("history expects a count, got `{n}`"))?,
            ),
        },
        "pause" | "p" => EngineCommand::Pause,
        "resume" | "r" => EngineCommand::Resume,
        "quit" | "exit" | "q" => EngineCommand::Shutdown,
        other => return Err(format!("unknown command `{other}`; {COMMAND_HELP}")),
    };
    Ok(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::aggregate::{aggregate, ConfidenceMode, EegStats};
    use crate::analysis::classifier::Prediction;
    use crate::types::{ClassProbabilities, Trend};

    fn fatigue_result() -> BatchResult {
        let tired = Prediction {
            label: Emotion::Fatigue,
            probabilities: ClassProbabilities { fatigue: 0.8, focus: 0.1, relax: 0.1 },
        };
        let alert = Prediction {
            label: Emotion::Focus,
            probabilities: ClassProbabilities { fatigue: 0.2, focus: 0.7, relax: 0.1 },
        };
        let mut batch = vec![tired; 7];
        batch.extend(vec![alert; 3]);
        let consensus = aggregate(&batch, ConfidenceMode::default()).unwrap();
        let ts = chrono::NaiveDate::from_ymd_opt(2025, 5, 31)
            .and_then(|d| d.and_hms_opt(11, 3, 37))
            .unwrap();
        BatchResult::new(
            ts,
            10,
            consensus,
            EegStats::from_bands([0.3, 0.28, 0.42], [Trend::Decreasing, Trend::Stable, Trend::Increasing]),
        )
    }

    #[test]
    fn panel_shows_state_breakdown_and_advice() {
        let counters = SessionCounters { total_batches: 4, total_samples: 40, duration_seconds: 20.0 };
        let text = render_batch(&fatigue_result(), &counters);
        assert!(text.contains("CURRENT STATE: 😴 FATIGUE"));
        assert!(text.contains("(7/10 samples)"));
        assert!(text.contains("HIGH FATIGUE"));
        assert!(text.contains("Total Samples: 40"));
        let fatigue_row = text.find("Fatigue :").unwrap();
        let focus_row = text.find("Focus   :").unwrap();
        assert!(fatigue_row < focus_row);
        assert!(text.contains("Theta (Drowsiness)  : 0.420 ↗"));
    }

    #[test]
    fn bars_are_fixed_width() {
        assert_eq!(bar(0.0).chars().count(), BAR_WIDTH);
        assert_eq!(bar(1.0), "█".repeat(BAR_WIDTH));
        assert_eq!(bar(0.5).chars().filter(|c| *c == '█').count(), 10);
    }

    #[test]
    fn console_commands_parse() {
        assert_eq!(parse_command("status"), Ok(EngineCommand::Status));
        assert_eq!(parse_command("history"), Ok(EngineCommand::History(DEFAULT_HISTORY_LIMIT)));
        assert_eq!(parse_command(" History 5 "), Ok(EngineCommand::History(5)));
        assert_eq!(parse_command("q"), Ok(EngineCommand::Shutdown));
        assert!(parse_command("history many").is_err());
        assert!(parse_command("dance").is_err());
        assert!(parse_command("   ").is_err());
    }

    #[test]
    fn history_line_is_compact() {
        let line = render_history_line(&fatigue_result());
        assert!(line.starts_with("11:03:37"));
        assert!(line.contains("fatigue"));
        assert!(line.ends_with("n=10"));
    }
}
