//! Ring buffer for rolling sample windows

use std::time::Duration;

/// Fixed-capacity rolling window. Once full, new samples overwrite the oldest.
pub struct RingBuffer<T> {
    samples: Vec<T>,
    capacity: usize,
    head: usize,
}

impl<T: Clone> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be non-zero");
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
            head: 0,
        }
    }

    pub fn push(&mut self, sample: T) {
        if self.samples.len() < self.capacity {
            self.samples.push(sample);
        } else {
            self.samples[self.head] = sample;
        }
        self.head = (self.head + 1) % self.capacity;
    }

    /// Most recently pushed sample.
    pub fn latest(&self) -> Option<&T> {
        if self.samples.is_empty() {
            return None;
        }
        let len = self.samples.len();
        Some(&self.samples[(self.head + len - 1) % len])
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.head = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.samples.iter()
    }
}

// Specialize for Duration (frame and module runtimes)
impl RingBuffer<Duration> {
    pub fn average(&self) -> Duration {
        if self.samples.is_empty() {
            return Duration::ZERO;
        }
        let sum: Duration = self.samples.iter().sum();
        sum / self.samples.len() as u32
    }

    pub fn min_max(&self) -> (Duration, Duration) {
        if self.samples.is_empty() {
            return (Duration::ZERO, Duration::ZERO);
        }
        let min = *self.samples.iter().min().unwrap();
        let max = *self.samples.iter().max().unwrap();
        (min, max)
    }
}

// Specialize for f64 (error signals, frequencies)
impl RingBuffer<f64> {
    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.samples.iter().sum();
        sum / self.samples.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_average_wraps() {
        let mut buffer = RingBuffer::new(3);

        buffer.push(Duration::from_millis(10));
        assert_eq!(buffer.average(), Duration::from_millis(10));

        buffer.push(Duration::from_millis(20));
        assert_eq!(buffer.average(), Duration::from_millis(15));

        buffer.push(Duration::from_millis(30));
        assert_eq!(buffer.average(), Duration::from_millis(20));

        // Oldest sample (10ms) falls out of the window
        buffer.push(Duration::from_millis(40));
        assert_eq!(buffer.average(), Duration::from_millis(30));
    }

    #[test]
    fn clear_empties_window() {
        let mut buffer = RingBuffer::new(4);
        buffer.push(1.0);
        buffer.push(2.0);
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.average(), 0.0);
    }
}
