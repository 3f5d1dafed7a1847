use std::collections::VecDeque;
use std::time::Duration;

/// Rolling average of the most recent item durations.
pub(crate) struct EtaEstimator {
    window: usize,
    samples: VecDeque<Duration>,
}

impl EtaEstimator {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            samples: VecDeque::with_capacity(window),
        }
    }

    pub fn record(&mut self, sample: Duration) {
        if self.samples.len() == self.window {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Seconds left for `remaining` items, or `None` before the first sample.
    pub fn estimate(&self, remaining: usize) -> Option<u64> {
        if self.samples.is_empty() {
            return None;
        }
        let total: Duration = self.samples.iter().sum();
        let average = total / self.samples.len() as u32;
        Some((average * remaining as u32).as_secs())
    }
}
