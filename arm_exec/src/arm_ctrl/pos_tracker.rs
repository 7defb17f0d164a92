//! End effector position tracker
//!
//! Keeps a short history of end effector positions so that a motion can be judged complete only
//! once the arm has physically settled, rather than as soon as it has been commanded.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use chrono::{DateTime, Duration, Utc};
use nalgebra::Vector3;
use std::collections::VecDeque;

use util::time::seconds_to_duration;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Time-windowed history of end effector positions.
#[derive(Debug, Clone)]
pub struct PositionTracker {
    samples: VecDeque<(Vector3<f64>, DateTime<Utc>)>,

    /// Samples older than this are discarded once there are enough younger ones.
    hold_time: Duration,

    /// Number of samples required before any stability is reported.
    min_history: usize,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PositionTracker {
    /// Create a new tracker for a loop running at `cycle_frequency_hz`.
    pub fn new(hold_time_s: f64, cycle_frequency_hz: f64) -> Self {
        let min_history = (cycle_frequency_hz * hold_time_s).ceil().max(1.0) as usize;

        Self {
            samples: VecDeque::with_capacity(min_history + 1),
            hold_time: seconds_to_duration(hold_time_s),
            min_history,
        }
    }

    pub fn add(&mut self, position_m: Vector3<f64>, timestamp: DateTime<Utc>) {
        self.samples.push_back((position_m, timestamp));
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn min_history(&self) -> usize {
        self.min_history
    }

    /// Mean distance of the samples from their mean position.
    ///
    /// Samples older than the hold time are pruned first, but never below the minimum history.
    /// If fewer than the minimum history remain `f64::INFINITY` is returned, meaning the arm
    /// cannot yet be judged still.
    pub fn error_at(&mut self, now: DateTime<Utc>) -> f64 {
        while self.samples.len() > self.min_history {
            match self.samples.front() {
                Some((_, t)) if now - *t > self.hold_time => {
                    self.samples.pop_front();
                }
                _ => break,
            }
        }

        if self.samples.len() < self.min_history {
            return f64::INFINITY;
        }

        let n = self.samples.len() as f64;
        let mean = self
            .samples
            .iter()
            .fold(Vector3::zeros(), |acc, (p, _)| acc + p)
            / n;

        self.samples
            .iter()
            .map(|(p, _)| (p - mean).norm())
            .sum::<f64>()
            / n
    }
}

impl Default for PositionTracker {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn ms(n: i64) -> Duration {
        Duration::milliseconds(n)
    }

    #[test]
    fn test_min_history() {
        assert_eq!(PositionTracker::new(0.5, 25.0).min_history(), 13);
        assert_eq!(PositionTracker::new(0.5, 10.0).min_history(), 5);
    }

    #[test]
    fn test_not_converged_until_min_history() {
        let mut t = PositionTracker::new(0.5, 25.0);
        let t0 = Utc::now();

        for i in 0..12 {
            t.add(Vector3::new(0.1, 0.0, 0.1), t0 + ms(40 * i));
            assert_eq!(t.error_at(t0 + ms(40 * i)), f64::INFINITY);
        }

        t.add(Vector3::new(0.1, 0.0, 0.1), t0 + ms(480));
        let err = t.error_at(t0 + ms(480));
        assert!(err.is_finite());
        assert!(err < 1e-12);

        t.clear();
        assert!(t.is_empty());
        assert_eq!(t.error_at(t0 + ms(520)), f64::INFINITY);
    }

    #[test]
    fn test_mean_deviation() {
        let mut t = PositionTracker::new(0.4, 10.0);
        let t0 = Utc::now();

        // Two points 2 mm either side of the mean
        t.add(Vector3::new(0.002, 0.0, 0.0), t0);
        t.add(Vector3::new(-0.002, 0.0, 0.0), t0 + ms(100));
        t.add(Vector3::new(0.002, 0.0, 0.0), t0 + ms(200));
        t.add(Vector3::new(-0.002, 0.0, 0.0), t0 + ms(300));

        assert!((t.error_at(t0 + ms(300)) - 0.002).abs() < 1e-12);
    }

    #[test]
    fn test_old_samples_pruned() {
        let mut t = PositionTracker::new(0.5, 10.0);
        let t0 = Utc::now();

        // An old outlier followed by a settled arm
        t.add(Vector3::new(1.0, 0.0, 0.0), t0);
        for i in 1..=5 {
            t.add(Vector3::zeros(), t0 + ms(100 * i));
        }

        // The outlier is still inside the hold time
        assert!(t.error_at(t0 + ms(500)) > 0.1);

        // Now it is not, and there are enough samples without it
        assert!(t.error_at(t0 + ms(600)) < 1e-12);
        assert_eq!(t.len(), 5);
    }
}
