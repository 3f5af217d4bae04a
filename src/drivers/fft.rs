use rustfft::{num_complex::Complex64, Fft, FftPlanner};
use std::sync::Arc;
use crate::drivers::TimeSeriesFrame;
use crate::types::Band;
/// Relative theta/alpha/beta power, normalized so the three bands sum to 1.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RelativeBandPower {
    pub alpha: f64,
    pub beta: f64,
    pub theta: f64,
}
/// Computes band powers over a fixed FFT window with a Hamming taper.
pub struct BandPowerEstimator {
    fft_size: usize,
    fft: Arc<dyn Fft<f64>>,
    window: Vec<f64>,
}
impl BandPowerEstimator {
    pub fn with_size(fft_size: usize) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let window = (0..fft_size)
            .map(|n| {
                0.54 - 0.46
                    * (2.0 * std::f64::consts::PI * n as f64 / (fft_size.max(2) - 1) as f64).cos()
            })
            .collect();
        Self {
            fft_size,
            fft,
            window,
        }
    }
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }
    /// Power spectrum of one channel; bins `0..fft_size/2`.
    pub fn power_spectrum(&self, channel: &[f64]) -> Vec<f64> {
        let mut buffer: Vec<Complex64> = channel
            .iter()
            .copied()
            .take(self.fft_size)
            .zip(&self.window)
            .map(|(v, w)| Complex64::new(v * w, 0.0))
            .collect();
        buffer.resize(self.fft_size, Complex64::new(0.0, 0.0));
        self.fft.process(&mut buffer);
        buffer
            .iter()
            .take(self.fft_size / 2)
            .map(|c| c.norm_sqr() / self.fft_size as f64)
            .collect()
    }
    /// Absolute power per band (`Band::ALL` order) for a single channel.
    pub fn band_powers(&self, channel: &[f64], sample_rate_hz: f64) -> [f64; 3] {
        let spectrum = self.power_spectrum(channel);
        let resolution = sample_rate_hz / self.fft_size as f64;
        let mut powers = [0.0; 3];
        for (k, power) in spectrum.iter().enumerate() {
            let freq = k as f64 * resolution;
            for band in Band::ALL {
                let (low, high) = band.range_hz();
                if freq >= low && freq < high {
                    powers[band.index()] += power;
                }
            }
        }
        powers
    }
    /// Channel-averaged relative band power. `None` when the frame carries no energy.
    pub fn relative(&self, frame: &TimeSeriesFrame) -> Option<RelativeBandPower> {
        if frame.samples.is_empty() {
            return None;
        }
        let mut totals = [0.0; 3];
        for channel in &frame.samples {
            let powers = self.band_powers(channel, frame.sample_rate_hz);
            let sum: f64 = powers.iter().sum();
            if sum <= f64::EPSILON {
                continue;
            }
            for (total, power) in totals.iter_mut().zip(powers) {
                *total += power / sum;
            }
        }
        let sum: f64 = totals.iter().sum();
        if sum <= f64::EPSILON {
            return None;
        }
        Some(RelativeBandPower {
            alpha: totals[Band::Alpha.index()] / sum,
            beta: totals[Band::Beta.index()] / sum,
            theta: totals[Band::Theta.index()] / sum,
        })
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    fn sine(freq_hz: f64, amplitude: f64, sample_rate_hz: f64, len: usize) -> Vec<f64> {
        (0..len)
            .map(|n| amplitude * (2.0 * std::f64::consts::PI * freq_hz * n as f64 / sample_rate_hz).sin())
            .collect()
    }
    #[test]
    fn pure_alpha_tone_dominates_alpha_band() {
        let estimator = BandPowerEstimator::with_size(256);
        let frame = TimeSeriesFrame {
            sample_rate_hz: 250.0,
            samples: vec![sine(10.0, 20.0, 250.0, 256)],
        };
        let rel = estimator.relative(&frame).unwrap();
        assert!(rel.alpha > 0.9, "alpha share was {}", rel.alpha);
        assert!((rel.alpha + rel.beta + rel.theta - 1.0).abs() < 1e-9);
    }
    #[test]
    fn mixed_tones_split_between_bands() {
        let estimator = BandPowerEstimator::with_size(256);
        let theta = sine(6.0, 10.0, 250.0, 256);
        let beta = sine(20.0, 10.0, 250.0, 256);
        let mixed: Vec<f64> = theta.iter().zip(&beta).map(|(a, b)| a + b).collect();
        let frame = TimeSeriesFrame {
            sample_rate_hz: 250.0,
            samples: vec![mixed],
        };
        let rel = estimator.relative(&frame).unwrap();
        assert!(rel.theta > 0.3 && rel.beta > 0.3);
        assert!(rel.alpha < 0.2);
    }
    #[test]
    fn silent_frame_yields_nothing() {
        let estimator = BandPowerEstimator::with_size(64);
        let frame = TimeSeriesFrame {
            sample_rate_hz: 250.0,
            samples: vec![vec![0.0; 64]],
        };
        assert!(estimator.relative(&frame).is_none());
    }
}
