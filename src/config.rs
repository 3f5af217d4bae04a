// src/config.rs
// Settings come from a TOML file (every section optional, built-in defaults
// otherwise) and a handful of command-line overrides applied on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::ValueEnum;
use log::LevelFilter;
use serde::Deserialize;

use crate::analysis::{ArtifactSettings, ConfidenceMode};
use crate::drivers::device::DEFAULT_API_URL;
use crate::drivers::{PipelineSettings, SimProfile, SimulatorSettings, ViolationPolicy};

/// Loaded when `--config` is not given and the file exists in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "emotion-monitor.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Synthetic headband with FFT band extraction
    Simulator,
    /// HTTP device API serving recent readings
    Device,
    /// Readings recorded as a JSON array, replayed one chunk per cycle
    Replay,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub acquisition: AcquisitionConfig,
    pub simulator: SimulatorConfig,
    pub artifact: ArtifactSettings,
    pub batching: BatchingConfig,
    pub trend: TrendConfig,
    pub session: SessionConfig,
    pub aggregation: AggregationConfig,
    pub model: ModelConfig,
    pub policy: PolicyConfig,
    pub export: ExportConfig,
    pub logging: LoggingConfig,
    /// File the settings were read from, if any.
    #[serde(skip)]
    pub source_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub source: SourceKind,
    pub api_url: String,
    /// Seconds between polls of the source; also the batching window.
    pub fetch_interval_secs: f64,
    pub request_timeout_secs: f64,
    /// Stop after this many fetch cycles. Runs until `quit` when unset.
    pub max_cycles: Option<u64>,
    pub replay_path: Option<PathBuf>,
    /// Readings handed over per cycle when replaying.
    pub replay_chunk: usize,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Simulator,
            api_url: DEFAULT_API_URL.to_string(),
            fetch_interval_secs: 5.0,
            request_timeout_secs: 3.0,
            max_cycles: None,
            replay_path: None,
            replay_chunk: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub profile: SimProfile,
    pub sample_rate_hz: f64,
    pub samples_per_fetch: usize,
    pub readings_per_second: f64,
    pub fft_size: usize,
    pub artifact_probability: f64,
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        let d = SimulatorSettings::default();
        Self {
            profile: d.profile,
            sample_rate_hz: d.sample_rate_hz,
            samples_per_fetch: d.samples_per_fetch,
            readings_per_second: d.readings_per_second,
            fft_size: d.fft_size,
            artifact_probability: d.artifact_probability,
            seed: d.seed,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchingConfig {
    pub batch_size: usize,
    pub min_batch_size: usize,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self { batch_size: 10, min_batch_size: 5 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    pub window: usize,
    pub epsilon: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self { window: 3, epsilon: 0.01 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub history_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { history_capacity: 100 }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub confidence_mode: ConfidenceMode,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub path: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self { path: PathBuf::from("models/emotion_forest.json") }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Defaults to `fail` in debug builds and `skip` in release builds.
    pub on_contract_violation: ViolationPolicy,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Rewritten after every batch for an external web layer.
    pub snapshot_path: Option<PathBuf>,
    /// Directory receiving the session summary at shutdown.
    pub session_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Used when `RUST_LOG` is not set.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub model: Option<PathBuf>,
    pub source: Option<SourceKind>,
    pub api_url: Option<String>,
    pub cycles: Option<u64>,
    pub batch_size: Option<usize>,
    pub interval: Option<f64>,
    pub seed: Option<u64>,
    pub profile: Option<SimProfile>,
    pub replay: Option<PathBuf>,
}

impl Config {
    /// Reads `path`, or the default file when present, or falls back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut config = Self::from_toml(&text)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        config.source_file = Some(path);
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text).context("failed to parse TOML")?;
        Ok(config)
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(model) = &overrides.model {
            self.model.path = model.clone();
        }
        if let Some(source) = overrides.source {
            self.acquisition.source = source;
        }
        if let Some(url) = &overrides.api_url {
            self.acquisition.api_url = url.clone();
        }
        if let Some(cycles) = overrides.cycles {
            self.acquisition.max_cycles = Some(cycles);
        }
        if let Some(batch_size) = overrides.batch_size {
            self.batching.batch_size = batch_size;
            self.batching.min_batch_size = self.batching.min_batch_size.min(batch_size);
        }
        if let Some(interval) = overrides.interval {
            self.acquisition.fetch_interval_secs = interval;
        }
        if let Some(seed) = overrides.seed {
            self.simulator.seed = Some(seed);
        }
        if let Some(profile) = overrides.profile {
            self.simulator.profile = profile;
        }
        if let Some(path) = &overrides.replay {
            self.acquisition.source = SourceKind::Replay;
            self.acquisition.replay_path = Some(path.clone());
        }
    }

    pub fn validate(&self) -> Result<()> {
        let b = &self.batching;
        if b.batch_size == 0 {
            bail!("batching.batch_size must be at least 1");
        }
        if b.min_batch_size == 0 || b.min_batch_size > b.batch_size {
            bail!(
                "batching.min_batch_size must be between 1 and batch_size ({}), got {}",
                b.batch_size,
                b.min_batch_size
            );
        }
        let a = &self.artifact;
        check_unit("artifact.max_rejection_rate", a.max_rejection_rate)?;
        check_positive("artifact.deviation_threshold", a.deviation_threshold)?;
        if a.rate_window == 0 || a.baseline_window == 0 {
            bail!("artifact.rate_window and artifact.baseline_window must be at least 1");
        }
        let q = &self.acquisition;
        check_positive("acquisition.fetch_interval_secs", q.fetch_interval_secs)?;
        check_positive("acquisition.request_timeout_secs", q.request_timeout_secs)?;
        if q.source == SourceKind::Replay && q.replay_path.is_none() {
            bail!("acquisition.replay_path is required for the replay source");
        }
        if q.replay_chunk == 0 {
            bail!("acquisition.replay_chunk must be at least 1");
        }
        let s = &self.simulator;
        check_unit("simulator.artifact_probability", s.artifact_probability)?;
        check_positive("simulator.sample_rate_hz", s.sample_rate_hz)?;
        check_positive("simulator.readings_per_second", s.readings_per_second)?;
        if s.samples_per_fetch == 0 {
            bail!("simulator.samples_per_fetch must be at least 1");
        }
        if s.fft_size < 16 {
            bail!("simulator.fft_size must be at least 16, got {}", s.fft_size);
        }
        if self.trend.window == 0 {
            bail!("trend.window must be at least 1");
        }
        if self.trend.epsilon.is_nan() || self.trend.epsilon < 0.0 {
            bail!("trend.epsilon must be non-negative");
        }
        if self.session.history_capacity == 0 {
            bail!("session.history_capacity must be at least 1");
        }
        self.log_level()?;
        Ok(())
    }

    pub fn log_level(&self) -> Result<LevelFilter> {
        self.logging
            .level
            .parse::<LevelFilter>()
            .map_err(|_| anyhow!("unknown logging.level `{}`", self.logging.level))
    }

    pub fn fetch_interval(&self) -> Duration {
        Duration::from_secs_f64(self.acquisition.fetch_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.acquisition.request_timeout_secs)
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            artifact: self.artifact.clone(),
            batch_size: self.batching.batch_size,
            min_batch_size: self.batching.min_batch_size,
            trend_window: self.trend.window,
            trend_epsilon: self.trend.epsilon,
            history_capacity: self.session.history_capacity,
            confidence_mode: self.aggregation.confidence_mode,
            on_contract_violation: self.policy.on_contract_violation,
        }
    }

    pub fn simulator_settings(&self) -> SimulatorSettings {
        let s = &self.simulator;
        SimulatorSettings {
            sample_rate_hz: s.sample_rate_hz,
            samples_per_fetch: s.samples_per_fetch,
            readings_per_second: s.readings_per_second,
            fft_size: s.fft_size,
            artifact_probability: s.artifact_probability,
            profile: s.profile,
            seed: s.seed,
        }
    }
}

fn check_unit(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        bail!("{name} must be within [0, 1], got {value}");
    }
    Ok(())
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if !(value > 0.0 && value.is_finite()) {
        bail!("{name} must be a positive number, got {value}");
    }
    Ok(())
}
