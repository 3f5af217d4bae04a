// src/brain_utils.rs
use std::collections::VecDeque;

/// Fixed-size sliding window over recent values.
#[derive(Clone, Debug)]
pub struct WindowBuffer {
    buffer: VecDeque<f64>,
    capacity: usize,
}

impl WindowBuffer {
    pub fn new(size: usize) -> Self {
        let capacity = size.max(1);
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Pushes a value, evicting the oldest one once the window is full.
    pub fn push(&mut self, val: f64) {
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(val);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Mean of the window, `None` while empty.
    pub fn mean(&self) -> Option<f64> {
        if self.buffer.is_empty() {
            return None;
        }
        let sum: f64 = self.buffer.iter().sum();
        Some(sum / self.buffer.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_keeps_most_recent_values() {
        let mut w = WindowBuffer::new(3);
        assert!(w.mean().is_none());
        for v in [1.0, 2.0, 3.0, 4.0] {
            w.push(v);
        }
        assert_eq!(w.len(), 3);
        assert!((w.mean().unwrap() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn zero_size_window_holds_one_value() {
        let mut w = WindowBuffer::new(0);
        w.push(5.0);
        w.push(7.0);
        assert_eq!(w.len(), 1);
        assert_eq!(w.mean(), Some(7.0));
    }
}
