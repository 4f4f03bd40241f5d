use std::collections::VecDeque;
use std::time::Instant;

use crate::{OperationKind, ProgressEvent, ThroughputSample};

/// Bounded rolling window of throughput samples.
///
/// The window is display history for the speed graph. The scalar that drives
/// the ETA is the latest sample, not an average over the window.
#[derive(Debug, Clone, PartialEq)]
pub struct ThroughputEstimator {
    window: VecDeque<ThroughputSample>,
    capacity: usize,
}

impl ThroughputEstimator {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn for_kind(kind: OperationKind) -> Self {
        Self::new(kind.window_capacity())
    }

    /// Records a sample derived from `event`, evicting the oldest one when full.
    pub fn observe(&mut self, event: &ProgressEvent, now: Instant) -> ThroughputSample {
        let rate = if event.elapsed_seconds > 0 {
            event.current_units as f64 / event.elapsed_seconds as f64
        } else {
            0.0
        };
        let sample = ThroughputSample {
            timestamp: now,
            rate,
        };
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(sample);
        sample
    }

    /// Rate of the most recent sample, or 0 when nothing has been observed.
    pub fn smoothed_rate(&self) -> f64 {
        self.window.back().map_or(0.0, |sample| sample.rate)
    }

    /// Largest rate currently in the window; used for graph axis scaling.
    pub fn max_rate_in_window(&self) -> f64 {
        self.window
            .iter()
            .map(|sample| sample.rate)
            .fold(0.0, f64::max)
    }

    /// Seconds until `current_units` reaches `total_units` at the current rate.
    ///
    /// `None` means unknown: no positive rate yet, or nothing left to do.
    pub fn eta(&self, total_units: u64, current_units: u64) -> Option<u64> {
        let rate = self.smoothed_rate();
        if rate <= 0.0 || current_units >= total_units {
            return None;
        }
        let remaining = (total_units - current_units) as f64;
        Some((remaining / rate).ceil() as u64)
    }

    pub fn samples(&self) -> impl Iterator<Item = &ThroughputSample> + '_ {
        self.window.iter()
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.window.clear();
    }
}
