use std::collections::VecDeque;
use crate::drivers::PipelineError;
/// Flattened view of the most recent raw samples.
#[derive(Clone, Debug)]
pub struct TimeSeriesFrame {
    pub sample_rate_hz: f64,
    pub samples: Vec<Vec<f64>>, // channels x samples
}
/// Rolling buffer that stores recent raw microvolt samples per channel.
pub struct SignalBuffer {
    per_channel: Vec<VecDeque<f64>>, // channel -> samples
    channel_labels: Vec<String>,
    sample_rate_hz: f64,
    capacity: usize,
}
impl SignalBuffer {
    pub fn with_history_seconds(
        channel_labels: Vec<String>,
        sample_rate_hz: f64,
        history_seconds: f64,
    ) -> Result<Self, PipelineError> {
        if sample_rate_hz <= 0.0 {
            return Err(PipelineError::InvalidSampleRate);
        }
        let capacity = ((sample_rate_hz * history_seconds).ceil() as usize).max(1);
        let per_channel = channel_labels
            .iter()
            .map(|_| VecDeque::with_capacity(capacity))
            .collect();
        Ok(Self {
            per_channel,
            channel_labels,
            sample_rate_hz,
            capacity,
        })
    }
    pub fn sample_rate_hz(&self) -> f64 {
        self.sample_rate_hz
    }
    pub fn channel_labels(&self) -> &[String] {
        &self.channel_labels
    }
    /// Appends one multi-channel frame, evicting the oldest value when full.
    pub fn push_frame(&mut self, frame: &[f64]) -> Result<(), PipelineError> {
        if frame.len() != self.per_channel.len() {
            return Err(PipelineError::ChannelMismatch {
                expected: self.per_channel.len(),
                actual: frame.len(),
            });
        }
        for (channel_queue, &sample) in self.per_channel.iter_mut().zip(frame) {
            if channel_queue.len() == self.capacity {
                channel_queue.pop_front();
            }
            channel_queue.push_back(sample);
        }
        Ok(())
    }
    /// The newest `count` samples of every channel, oldest first.
    pub fn latest(&self, count: usize) -> TimeSeriesFrame {
        let samples: Vec<Vec<f64>> = self
            .per_channel
            .iter()
            .map(|channel| {
                let skip = channel.len().saturating_sub(count);
                channel.iter().skip(skip).copied().collect()
            })
            .collect();
        TimeSeriesFrame {
            sample_rate_hz: self.sample_rate_hz,
            samples,
        }
    }
}
