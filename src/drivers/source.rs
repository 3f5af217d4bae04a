use std::collections::VecDeque;
use std::path::Path;
use log::info;
use crate::drivers::PipelineError;
use crate::types::Sample;
/// Anything that can be polled for the band-power readings gathered since the last poll.
///
/// An empty vector means "nothing new this cycle" and is not an error.
pub trait SampleSource {
    fn get_recent_samples(&mut self) -> Result<Vec<Sample>, PipelineError>;
    fn describe(&self) -> String {
        "sample source".to_owned()
    }
}
impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn get_recent_samples(&mut self) -> Result<Vec<Sample>, PipelineError> {
        (**self).get_recent_samples()
    }
    fn describe(&self) -> String {
        (**self).describe()
    }
}
/// In-memory source for deterministic playback of recorded readings.
/// Each queued entry is returned by one poll; once drained it yields empty cycles.
pub struct ManualSource {
    queue: VecDeque<Vec<Sample>>,
}
impl ManualSource {
    pub fn new(cycles: impl IntoIterator<Item = Vec<Sample>>) -> Self {
        Self {
            queue: cycles.into_iter().collect(),
        }
    }
    /// Loads a JSON array of readings (the device API's payload format) and
    /// splits it into cycles of `per_cycle` readings.
    pub fn from_recording(path: impl AsRef<Path>, per_cycle: usize) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let samples: Vec<Sample> = serde_json::from_str(&text)
            .map_err(|e| PipelineError::Acquisition(format!("bad recording {}: {e}", path.display())))?;
        let source = Self::new(samples.chunks(per_cycle.max(1)).map(|c| c.to_vec()));
        info!("replaying {} readings from {}", samples.len(), path.display());
        Ok(source)
    }
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}
impl SampleSource for ManualSource {
    fn get_recent_samples(&mut self) -> Result<Vec<Sample>, PipelineError> {
        Ok(self.queue.pop_front().unwrap_or_default())
    }
    fn describe(&self) -> String {
        format!("recorded readings ({} cycles left)", self.remaining())
    }
}
