// src/main.rs
mod advice;
mod analysis;
mod brain_utils;
mod config;
mod console;
mod drivers;
mod engine;
mod recorder;
mod report;
mod types;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use crate::analysis::EmotionClassifier;
use crate::config::{Config, Overrides, SourceKind};
use crate::drivers::{
    EmotionPipeline, HttpDeviceSource, ManualSource, SampleSource, SimProfile, SimulatedHeadband,
};
use crate::engine::EngineOptions;
use crate::recorder::{SessionExporter, SnapshotWriter};
use crate::report::{live_response, ApiResponse};
use crate::types::{EngineInput, MonitorEvent};
/// Real-time EEG emotion monitor: classifies focus, relax and fatigue from band power.
#[derive(Parser, Debug)]
#[command(name = "emotion-monitor", version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Model artifact (JSON)
    #[arg(long)]
    model: Option<PathBuf>,
    /// Where samples come from
    #[arg(long, value_enum)]
    source: Option<SourceKind>,
    /// Device API endpoint
    #[arg(long, env = "EEG_API_URL")]
    api_url: Option<String>,
    /// Stop after this many fetch cycles
    #[arg(long)]
    cycles: Option<u64>,
    #[arg(long)]
    batch_size: Option<usize>,
    /// Seconds between fetches
    #[arg(long)]
    interval: Option<f64>,
    /// Seed for the simulated headband
    #[arg(long)]
    seed: Option<u64>,
    /// Simulated state: focus, relax, fatigue or drift
    #[arg(long, value_parser = parse_profile)]
    profile: Option<SimProfile>,
    /// Replay readings from a JSON recording instead of polling
    #[arg(long, conflicts_with = "source")]
    replay: Option<PathBuf>,
}
fn parse_profile(s: &str) -> Result<SimProfile, String> {
    SimProfile::parse(s).ok_or_else(|| format!("unknown profile `{s}`"))
}
impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            model: self.model.clone(),
            source: self.source,
            api_url: self.api_url.clone(),
            cycles: self.cycles,
            batch_size: self.batch_size,
            interval: self.interval,
            seed: self.seed,
            profile: self.profile,
            replay: self.replay.clone(),
        }
    }
}
fn open_source(config: &Config) -> Result<Box<dyn SampleSource + Send>> {
    Ok(match config.acquisition.source {
        SourceKind::Simulator => Box::new(
            SimulatedHeadband::new(config.simulator_settings()).context("failed to start simulated headband")?,
        ),
        SourceKind::Device => Box::new(
            HttpDeviceSource::connect(&config.acquisition.api_url, config.request_timeout())
                .context("failed to set up device API client")?,
        ),
        SourceKind::Replay => {
            let path = config
                .acquisition
                .replay_path
                .as_ref()
                .ok_or_else(|| anyhow!("no recording to replay"))?;
            Box::new(
                ManualSource::from_recording(path, config.acquisition.replay_chunk)
                    .with_context(|| format!("cannot replay {}", path.display()))?,
            )
        }
    })
}
// Console commands travel on the engine's input channel.
fn spawn_stdin_reader(tx: Sender<EngineInput>) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match console::parse_command(&line) {
                Ok(cmd) => {
                    if tx.send(EngineInput::Command(cmd)).is_err() {
                        break;
                    }
                }
                Err(msg) => println!("{msg}"),
            }
        }
    });
}
fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => warn!("cannot encode response: {e}"),
    }
}
fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    config.apply(&cli.overrides());
    config.validate().context("invalid configuration")?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.logging.level)).init();
    match &config.source_file {
        Some(path) => info!("loaded configuration from {}", path.display()),
        None => debug!("no configuration file, using defaults"),
    }

    // a missing or broken model is fatal before anything starts
    let classifier = EmotionClassifier::load(&config.model.path)
        .with_context(|| format!("cannot load model {}", config.model.path.display()))?;
    let pipeline = EmotionPipeline::new(classifier, config.pipeline_settings());
    let source = open_source(&config)?;
    let options = EngineOptions {
        max_cycles: config.acquisition.max_cycles,
        snapshot: config.export.snapshot_path.clone().map(SnapshotWriter::new),
        exporter: config.export.session_dir.clone().map(SessionExporter::new),
    };

    let (input_tx, input_rx) = mpsc::channel();
    let (event_tx, event_rx) = mpsc::channel();
    let stop = Arc::new(AtomicBool::new(false));
    let engine = engine::spawn(pipeline, options, input_rx, event_tx, stop.clone());
    let sampler = engine::spawn_sampler(source, config.fetch_interval(), input_tx.clone(), stop);
    spawn_stdin_reader(input_tx);
    info!("🧠 monitoring started, batch size {}", config.batching.batch_size);
    println!("{}", console::COMMAND_HELP);

    for event in event_rx {
        match event {
            MonitorEvent::BatchReady(result, counters) => {
                println!("{}", console::render_batch(&result, &counters));
            }
            MonitorEvent::CycleEmpty => println!("⏳ Waiting for EEG data..."),
            MonitorEvent::CycleSummary { accepted, rejected, discarded } => {
                debug!("cycle: {accepted} accepted, {rejected} rejected as artifacts, {discarded} discarded");
            }
            MonitorEvent::BatchSkipped(reason) => warn!("batch skipped: {reason}"),
            MonitorEvent::Status(report) => print_json(&live_response(report)),
            MonitorEvent::History(report) => {
                if report.prediction_history.is_empty() {
                    print_json(&ApiResponse::<()>::error("No history yet"));
                }
                for result in &report.prediction_history {
                    println!("{}", console::render_history_line(result));
                }
            }
            MonitorEvent::Paused(true) => println!("⏸ paused"),
            MonitorEvent::Paused(false) => println!("▶ resumed"),
            MonitorEvent::Stopped => break,
        }
    }

    let outcome = engine.join().map_err(|_| anyhow!("engine thread panicked"))?;
    if sampler.join().is_err() {
        warn!("sampler thread panicked");
    }
    outcome
}
