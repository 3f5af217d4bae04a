use std::f64::consts::PI;
use chrono::{Duration, Local, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use crate::drivers::fft::BandPowerEstimator;
use crate::drivers::source::SampleSource;
use crate::drivers::{PipelineError, SignalBuffer};
use crate::types::Sample;
/// Which mental state the synthetic signal imitates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimProfile {
    Focus,
    Relax,
    Fatigue,
    /// Slowly rotates through focus -> relax -> fatigue.
    Drift,
}
impl SimProfile {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "focus" => Some(SimProfile::Focus),
            "relax" => Some(SimProfile::Relax),
            "fatigue" => Some(SimProfile::Fatigue),
            "drift" => Some(SimProfile::Drift),
            _ => None,
        }
    }
    /// Sine amplitudes (uV) for theta, alpha, beta at a point in the session.
    fn amplitudes(&self, elapsed_secs: f64) -> [f64; 3] {
        const FOCUS: [f64; 3] = [6.0, 7.0, 12.0];
        const RELAX: [f64; 3] = [6.0, 13.0, 6.0];
        const FATIGUE: [f64; 3] = [13.0, 7.0, 5.0];
        match self {
            SimProfile::Focus => FOCUS,
            SimProfile::Relax => RELAX,
            SimProfile::Fatigue => FATIGUE,
            SimProfile::Drift => {
                // one full rotation every three minutes
                let phase = (elapsed_secs / 60.0).rem_euclid(3.0);
                let (from, to) = match phase as usize {
                    0 => (FOCUS, RELAX),
                    1 => (RELAX, FATIGUE),
                    _ => (FATIGUE, FOCUS),
                };
                let t = phase.fract();
                [0, 1, 2].map(|i| from[i] + (to[i] - from[i]) * t)
            }
        }
    }
}
#[derive(Clone, Debug)]
pub struct SimulatorSettings {
    pub sample_rate_hz: f64,
    pub samples_per_fetch: usize,
    pub readings_per_second: f64,
    pub fft_size: usize,
    pub artifact_probability: f64,
    pub profile: SimProfile,
    pub seed: Option<u64>,
}
impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            sample_rate_hz: 250.0,
            samples_per_fetch: 10,
            readings_per_second: 25.0,
            fft_size: 256,
            artifact_probability: 0.01,
            profile: SimProfile::Drift,
            seed: None,
        }
    }
}
/// Synthetic two-channel headband (T3-O1, T4-O2 bipolar montage).
///
/// Raw microvolt traces are generated sample by sample, kept in a rolling
/// buffer, and turned into relative band power through an FFT each time a
/// reading is due.
pub struct SimulatedHeadband {
    settings: SimulatorSettings,
    rng: StdRng,
    buffer: SignalBuffer,
    estimator: BandPowerEstimator,
    raw_index: u64,
    clock: NaiveDateTime,
    artifact_left: usize,
}
impl SimulatedHeadband {
    pub fn new(settings: SimulatorSettings) -> Result<Self, PipelineError> {
        if settings.sample_rate_hz <= 0.0 || settings.readings_per_second <= 0.0 {
            return Err(PipelineError::InvalidSampleRate);
        }
        let history_seconds = settings.fft_size as f64 / settings.sample_rate_hz * 2.0;
        let buffer = SignalBuffer::with_history_seconds(
            vec!["T3-O1".into(), "T4-O2".into()],
            settings.sample_rate_hz,
            history_seconds,
        )?;
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let estimator = BandPowerEstimator::with_size(settings.fft_size);
        let mut headband = Self {
            settings,
            rng,
            buffer,
            estimator,
            raw_index: 0,
            clock: Local::now().naive_local(),
            artifact_left: 0,
        };
        // prime the window so the first reading has a full FFT frame
        let prime = headband.estimator.fft_size();
        for _ in 0..prime {
            headband.step_raw()?;
        }
        Ok(headband)
    }
    fn elapsed_secs(&self) -> f64 {
        self.raw_index as f64 / self.settings.sample_rate_hz
    }
    fn step_raw(&mut self) -> Result<(), PipelineError> {
        let t = self.elapsed_secs();
        let [theta_amp, alpha_amp, beta_amp] = self.settings.profile.amplitudes(t);
        let mut frame = [0.0f64; 2];
        for (ch, value) in frame.iter_mut().enumerate() {
            let offset = ch as f64 * 0.7;
            let noise: f64 = (0..4).map(|_| self.rng.gen_range(-1.0f64..1.0)).sum::<f64>() * 1.5;
            *value = theta_amp * (2.0 * PI * 6.0 * t + offset).sin()
                + alpha_amp * (2.0 * PI * 10.0 * t + offset).sin()
                + beta_amp * (2.0 * PI * 20.0 * t + offset).sin()
                + noise;
            if self.artifact_left > 0 {
                // eye-movement burst: large slow deflection in the theta range
                *value += 120.0 * (2.0 * PI * 5.0 * t).sin();
            }
        }
        self.artifact_left = self.artifact_left.saturating_sub(1);
        self.buffer.push_frame(&frame)?;
        self.raw_index += 1;
        Ok(())
    }
    fn next_reading(&mut self) -> Result<Option<Sample>, PipelineError> {
        let hop = (self.settings.sample_rate_hz / self.settings.readings_per_second)
            .round()
            .max(1.0) as usize;
        let artifact_chance = self.settings.artifact_probability.clamp(0.0, 1.0);
        if self.artifact_left == 0 && self.rng.gen_bool(artifact_chance) {
            // roughly the length of a blink
            self.artifact_left = hop * 3;
        }
        for _ in 0..hop {
            self.step_raw()?;
        }
        self.clock += Duration::microseconds((1_000_000.0 / self.settings.readings_per_second) as i64);
        let frame = self.buffer.latest(self.estimator.fft_size());
        Ok(self
            .estimator
            .relative(&frame)
            .map(|rel| Sample::new(self.clock, rel.alpha, rel.beta, rel.theta)))
    }
}
impl SampleSource for SimulatedHeadband {
    fn get_recent_samples(&mut self) -> Result<Vec<Sample>, PipelineError> {
        let mut samples = Vec::with_capacity(self.settings.samples_per_fetch);
        for _ in 0..self.settings.samples_per_fetch {
            if let Some(sample) = self.next_reading()? {
                samples.push(sample);
            }
        }
        Ok(samples)
    }
    fn describe(&self) -> String {
        format!(
            "simulated headband ({:?}, {} Hz, channels {:?})",
            self.settings.profile,
            self.buffer.sample_rate_hz(),
            self.buffer.channel_labels()
        )
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    fn settings(profile: SimProfile) -> SimulatorSettings {
        SimulatorSettings {
            profile,
            artifact_probability: 0.0,
            seed: Some(7),
            ..SimulatorSettings::default()
        }
    }
    fn mean_bands(samples: &[Sample]) -> [f64; 3] {
        let n = samples.len() as f64;
        let mut acc = [0.0; 3];
        for s in samples {
            for (a, v) in acc.iter_mut().zip(s.bands()) {
                *a += v / n;
            }
        }
        acc
    }
    #[test]
    fn fetch_yields_normalized_readings() {
        let mut sim = SimulatedHeadband::new(settings(SimProfile::Focus)).unwrap();
        let samples = sim.get_recent_samples().unwrap();
        assert_eq!(samples.len(), 10);
        for s in &samples {
            assert!(s.in_unit_range());
            assert!((s.alpha + s.beta + s.theta - 1.0).abs() < 1e-9);
        }
        assert!(samples.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }
    #[test]
    fn profiles_shift_band_dominance() {
        let mut focus = SimulatedHeadband::new(settings(SimProfile::Focus)).unwrap();
        let mut relax = SimulatedHeadband::new(settings(SimProfile::Relax)).unwrap();
        let mut tired = SimulatedHeadband::new(settings(SimProfile::Fatigue)).unwrap();
        let [fa, fb, _] = mean_bands(&focus.get_recent_samples().unwrap());
        let [ra, rb, _] = mean_bands(&relax.get_recent_samples().unwrap());
        let [ta, _, tt] = mean_bands(&tired.get_recent_samples().unwrap());
        assert!(fb > fa, "focus beta {fb} alpha {fa}");
        assert!(ra > rb, "relax alpha {ra} beta {rb}");
        assert!(tt > ta, "fatigue theta {tt} alpha {ta}");
    }
    #[test]
    fn seeded_simulators_are_reproducible() {
        let mut a = SimulatedHeadband::new(settings(SimProfile::Drift)).unwrap();
        let mut b = SimulatedHeadband::new(settings(SimProfile::Drift)).unwrap();
        let sa: Vec<[f64; 3]> = a.get_recent_samples().unwrap().iter().map(Sample::bands).collect();
        let sb: Vec<[f64; 3]> = b.get_recent_samples().unwrap().iter().map(Sample::bands).collect();
        assert_eq!(sa, sb);
    }
    #[test]
    fn profile_names_parse() {
        assert_eq!(SimProfile::parse("Drift"), Some(SimProfile::Drift));
        assert_eq!(SimProfile::parse("sleepy"), None);
    }
}
