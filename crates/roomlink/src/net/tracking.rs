use std::collections::VecDeque;
use std::time::Duration;

use super::protocol::DEFAULT_LATENCY_WINDOW;

/// Sliding window of round-trip samples in milliseconds.
#[derive(Debug, Clone)]
pub struct LatencyTracker {
    samples: VecDeque<f64>,
    capacity: usize,
    recorded: u64,
}

impl Default for LatencyTracker {
    fn default() -> Self {
        Self::new(DEFAULT_LATENCY_WINDOW)
    }
}

impl LatencyTracker {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            recorded: 0,
        }
    }

    pub fn record_sample(&mut self, rtt_ms: f64) {
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(rtt_ms);
        self.recorded += 1;
    }

    pub fn record_rtt(&mut self, rtt: Duration) {
        self.record_sample(rtt.as_nanos() as f64 / 1_000_000.0);
    }

    pub fn current(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    pub fn average(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
    }

    pub fn samples(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples recorded over the tracker's lifetime, including evicted ones.
    pub fn recorded(&self) -> u64 {
        self.recorded
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_window_has_no_latency() {
        let tracker = LatencyTracker::default();
        assert_eq!(tracker.capacity(), 10);
        assert_eq!(tracker.current(), None);
        assert_eq!(tracker.average(), None);
    }

    #[test]
    fn current_and_average() {
        let mut tracker = LatencyTracker::new(10);
        tracker.record_sample(50.0);
        tracker.record_sample(150.0);

        assert_eq!(tracker.current(), Some(150.0));
        assert_eq!(tracker.average(), Some(100.0));
    }

    #[test]
    fn window_keeps_last_samples_in_order() {
        let mut tracker = LatencyTracker::new(3);
        for rtt in 1..=7 {
            tracker.record_sample(rtt as f64);
        }

        assert_eq!(tracker.len(), 3);
        assert_eq!(tracker.samples().collect::<Vec<_>>(), vec![5.0, 6.0, 7.0]);
        assert_eq!(tracker.average(), Some(6.0));
    }

    #[test]
    fn zero_capacity_is_coerced() {
        let mut tracker = LatencyTracker::new(0);
        tracker.record_sample(1.0);
        tracker.record_sample(2.0);
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.current(), Some(2.0));
    }

    #[test]
    fn record_rtt_converts_to_millis() {
        let mut tracker = LatencyTracker::default();
        tracker.record_rtt(Duration::from_micros(12_500));
        assert_eq!(tracker.current(), Some(12.5));
        tracker.clear();
        assert!(tracker.is_empty());
    }

    #[test]
    fn recorded_keeps_counting_once_the_window_is_full() {
        let mut tracker = LatencyTracker::new(2);
        for rtt in 0..5 {
            tracker.record_sample(rtt as f64);
        }
        assert_eq!(tracker.len(), 2);
        assert_eq!(tracker.recorded(), 5);

        tracker.clear();
        tracker.record_sample(9.0);
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.recorded(), 6);
    }
}
