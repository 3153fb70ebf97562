// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Fixed-capacity sliding window of samples for one resource.

use std::collections::VecDeque;

/// Ring buffer of the most recent percent-available samples.
///
/// Once full, each push evicts the oldest sample, so [`mean`](Self::mean)
/// is a moving average over at most `capacity` readings.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl SampleWindow {
    /// Creates an empty window. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
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

    /// Arithmetic mean of the buffered samples, `None` when empty.
    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
    }

    /// Normalised change from the oldest to the newest sample, in `[-1, 1]`.
    ///
    /// Samples are percentages, so a swing across the full 0–100 range maps
    /// to ±1. Negative means availability is falling (pressure building).
    /// Returns 0 with fewer than two samples or when all samples are equal.
    pub fn trend(&self) -> f64 {
        if self.samples.len() < 2 {
            return 0.0;
        }
        let (Some(oldest), Some(newest)) = (self.samples.front(), self.samples.back()) else {
            return 0.0;
        };
        let no_variance = self
            .samples
            .iter()
            .all(|s| (s - oldest).abs() < f64::EPSILON);
        if no_variance {
            return 0.0;
        }
        ((newest - oldest) / 100.0).clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_of_empty_window() {
        let w = SampleWindow::new(10);
        assert!(w.mean().is_none());
        assert_eq!(w.trend(), 0.0);
    }

    #[test]
    fn test_mean_and_eviction() {
        let mut w = SampleWindow::new(3);
        for v in [10.0, 20.0, 30.0, 40.0] {
            w.push(v);
        }
        assert_eq!(w.len(), 3);
        assert!((w.mean().unwrap() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_trend_falling() {
        let mut w = SampleWindow::new(10);
        for v in [80.0, 70.0, 60.0, 30.0] {
            w.push(v);
        }
        assert!((w.trend() - (-0.5)).abs() < 1e-9);
    }

    #[test]
    fn test_trend_single_sample() {
        let mut w = SampleWindow::new(10);
        w.push(50.0);
        assert_eq!(w.trend(), 0.0);
    }

    #[test]
    fn test_trend_flat() {
        let mut w = SampleWindow::new(4);
        for _ in 0..4 {
            w.push(42.0);
        }
        assert_eq!(w.trend(), 0.0);
    }

    #[test]
    fn test_trend_is_bounded() {
        let mut w = SampleWindow::new(2);
        w.push(0.0);
        w.push(100.0);
        assert_eq!(w.trend(), 1.0);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut w = SampleWindow::new(0);
        w.push(1.0);
        w.push(2.0);
        assert_eq!(w.capacity(), 1);
        assert_eq!(w.mean(), Some(2.0));
    }
}
