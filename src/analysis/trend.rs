use crate::brain_utils::WindowBuffer;
use crate::types::{Band, Trend};
/// Short-term direction of each band's batch average.
pub struct TrendTracker {
    epsilon: f64,
    windows: [WindowBuffer; 3],
}
impl TrendTracker {
    pub fn new(window: usize, epsilon: f64) -> Self {
        Self {
            epsilon,
            windows: [
                WindowBuffer::new(window),
                WindowBuffer::new(window),
                WindowBuffer::new(window),
            ],
        }
    }
    /// Compares `value` with the mean of the window, then pushes it.
    pub fn update(&mut self, band: Band, value: f64) -> Trend {
        let window = &mut self.windows[band.index()];
        let trend = match window.mean() {
            Some(mean) if value > mean + self.epsilon => Trend::Increasing,
            Some(mean) if value < mean - self.epsilon => Trend::Decreasing,
            _ => Trend::Stable,
        };
        window.push(value);
        trend
    }
    /// Updates all bands from `Band::ALL`-ordered averages.
    pub fn update_all(&mut self, avgs: [f64; 3]) -> [Trend; 3] {
        Band::ALL.map(|band| self.update(band, avgs[band.index()]))
    }
}
