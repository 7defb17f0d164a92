//! General time utility functions

use std::{
    thread,
    time::{Duration, Instant},
};

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

/// Convert a number of seconds into a chrono duration.
///
/// Sub-nanosecond precision is discarded.
pub fn seconds_to_duration(seconds: f64) -> chrono::Duration {
    chrono::Duration::nanoseconds((seconds * NANOS_PER_SECOND as f64) as i64)
}

/// Outcome of waiting out the remainder of a fixed-rate cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleEnd {
    /// The cycle finished early and the thread slept for the given time.
    Slept(Duration),

    /// The cycle took longer than the period, by the given time.
    Overran(Duration),
}

/// Sleep for whatever is left of a cycle of length `period` which started at `cycle_start`.
///
/// The time spent doing work in the cycle is measured and subtracted from the period, so loops
/// hold their target rate even when the work itself is slow.
pub fn end_cycle(cycle_start: Instant, period: Duration) -> CycleEnd {
    let cycle_dur = Instant::now() - cycle_start;

    match period.checked_sub(cycle_dur) {
        Some(d) => {
            thread::sleep(d);
            CycleEnd::Slept(d)
        }
        None => CycleEnd::Overran(cycle_dur - period),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_seconds_round_trip() {
        let d = seconds_to_duration(0.25);
        assert_eq!(d, chrono::Duration::milliseconds(250));
        assert_eq!(duration_to_seconds(d), Some(0.25));
    }

    #[test]
    fn test_end_cycle_overrun() {
        let start = Instant::now() - Duration::from_millis(50);

        match end_cycle(start, Duration::from_millis(10)) {
            CycleEnd::Overran(d) => assert!(d >= Duration::from_millis(40)),
            e => panic!("Expected an overrun, got {:?}", e),
        }
    }
}
