use log::debug;
use crate::analysis::artifact::FilteredSample;
use crate::types::Band;
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SealReason {
    Full,
    WindowElapsed,
}
/// Ordered, non-empty run of filtered samples.
#[derive(Clone, Debug)]
pub struct Batch {
    samples: Vec<FilteredSample>,
    reason: SealReason,
}
impl Batch {
    fn sealed(samples: Vec<FilteredSample>, reason: SealReason) -> Option<Self> {
        (!samples.is_empty()).then_some(Self { samples, reason })
    }
    pub fn len(&self) -> usize {
        self.samples.len()
    }
    pub fn samples(&self) -> &[FilteredSample] {
        &self.samples
    }
    pub fn reason(&self) -> SealReason {
        self.reason
    }
    /// Mean of each band over the batch's actual length.
    pub fn band_means(&self) -> [f64; 3] {
        let n = self.samples.len().max(1) as f64;
        let mut means = [0.0; 3];
        for filtered in &self.samples {
            for band in Band::ALL {
                means[band.index()] += filtered.sample().band(band);
            }
        }
        means.map(|sum| sum / n)
    }
}
pub struct Batcher {
    batch_size: usize,
    min_batch_size: usize,
    pending: Vec<FilteredSample>,
    discarded: u64,
}
impl Batcher {
    pub fn new(batch_size: usize, min_batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            batch_size,
            min_batch_size: min_batch_size.clamp(1, batch_size),
            pending: Vec::with_capacity(batch_size),
            discarded: 0,
        }
    }
    /// Samples thrown away so far because a window closed on a too-short remainder.
    pub fn discarded_total(&self) -> u64 {
        self.discarded
    }
    pub fn accept(&mut self, sample: FilteredSample) -> Option<Batch> {
        self.pending.push(sample);
        if self.pending.len() < self.batch_size {
            return None;
        }
        let samples = std::mem::replace(&mut self.pending, Vec::with_capacity(self.batch_size));
        Batch::sealed(samples, SealReason::Full)
    }
    /// Closes the current fetch window.
    pub fn seal_window(&mut self) -> Option<Batch> {
        if self.pending.is_empty() {
            return None;
        }
        if self.pending.len() < self.min_batch_size {
            debug!(
                "discarding {} samples at window end (minimum batch is {})",
                self.pending.len(),
                self.min_batch_size
            );
            self.discarded += self.pending.len() as u64;
            self.pending.clear();
            return None;
        }
        let samples = std::mem::take(&mut self.pending);
        Batch::sealed(samples, SealReason::WindowElapsed)
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::pipeline::sample_at;
    fn clean(i: i64, alpha: f64) -> FilteredSample {
        FilteredSample::assume_clean(sample_at(i * 40, alpha, 0.3, 0.3))
    }
    #[test]
    fn full_batch_is_emitted_and_buffer_resets() {
        let mut batcher = Batcher::new(3, 2);
        assert!(batcher.accept(clean(0, 0.1)).is_none());
        assert!(batcher.accept(clean(1, 0.2)).is_none());
        let batch = batcher.accept(clean(2, 0.3)).unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.reason(), SealReason::Full);
        assert!((batch.band_means()[0] - 0.2).abs() < 1e-12);
        assert!(batcher.seal_window().is_none());
        assert_eq!(batcher.discarded_total(), 0);
    }
    #[test]
    fn window_end_emits_short_batch_or_discards() {
        let mut batcher = Batcher::new(10, 4);
        for i in 0..6 {
            batcher.accept(clean(i, 0.4));
        }
        let short = batcher.seal_window().unwrap();
        assert_eq!(short.len(), 6);
        assert_eq!(short.reason(), SealReason::WindowElapsed);
        for i in 0..3 {
            batcher.accept(clean(i, 0.4));
        }
        assert!(batcher.seal_window().is_none());
        assert_eq!(batcher.discarded_total(), 3);
        // the discarded remainder does not leak into the next window
        assert!(batcher.seal_window().is_none());
        assert_eq!(batcher.discarded_total(), 3);
    }
}
