//! Error correlation between ground truth and client estimates
//!
//! Two position streams arrive independently: simulated ground truth from
//! the server and estimated positions from clients. The correlator keeps the
//! most recent sample of each and produces an `ErrorMetric` when a new sample
//! can be paired with a usable counterpart.

use crate::constants::DEFAULT_CORRELATION_WINDOW_MS;
use crate::log_warn;
use crate::types::{now_millis, round2, ErrorMetric, Position};

/// Euclidean distance between two samples, rounded to two decimals and
/// stamped with the current wall-clock time
pub fn correlate(predicted: &Position, actual: &Position) -> ErrorMetric {
    correlate_at(predicted, actual, now_millis())
}

/// `correlate` with an explicit correlation timestamp
pub fn correlate_at(predicted: &Position, actual: &Position, now: i64) -> ErrorMetric {
    ErrorMetric { error: round2(predicted.distance_to(actual)), timestamp: now }
}

/// Latest-sample correlator.
///
/// Both triggers fire independently. A client sample that arrives shortly
/// before a ground-truth sample is correlated once on arrival and again when
/// the ground truth lands inside the window.
#[derive(Debug, Clone)]
pub struct Correlator {
    window_ms: i64,
    last_ground_truth: Option<Position>,
    last_client: Option<Position>,
}

impl Correlator {
    /// Correlator with a custom pairing window
    pub fn new(window_ms: i64) -> Self {
        Self { window_ms, last_ground_truth: None, last_client: None }
    }

    /// Pairing window in milliseconds
    pub fn window_ms(&self) -> i64 {
        self.window_ms
    }

    /// Most recent ground-truth sample
    pub fn last_ground_truth(&self) -> Option<Position> {
        self.last_ground_truth
    }

    /// Most recent client sample
    pub fn last_client(&self) -> Option<Position> {
        self.last_client
    }

    /// Record a client estimate and correlate it against the latest ground
    /// truth. Nothing is produced until some ground truth is known.
    pub fn on_client_coordinates(&mut self, estimate: Position, now: i64) -> Option<ErrorMetric> {
        self.last_client = Some(estimate);
        let actual = self.last_ground_truth?;
        finite(correlate_at(&estimate, &actual, now))
    }

    /// Record a ground-truth sample and correlate it against the latest
    /// client estimate if that estimate is less than `window_ms` older.
    pub fn on_ground_truth(&mut self, actual: Position, now: i64) -> Option<ErrorMetric> {
        self.last_ground_truth = Some(actual);
        let estimate = self.last_client?;
        if actual.timestamp.saturating_sub(estimate.timestamp) < self.window_ms {
            finite(correlate_at(&estimate, &actual, now))
        } else {
            None
        }
    }
}

/// Metrics go out as JSON numbers; an infinite error would encode as `null`
fn finite(metric: ErrorMetric) -> Option<ErrorMetric> {
    if metric.error.is_finite() {
        Some(metric)
    } else {
        log_warn!("Discarding non-finite tracking error at {}", metric.timestamp);
        None
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new(DEFAULT_CORRELATION_WINDOW_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn client_sample_inside_window_scenario() {
        let mut correlator = Correlator::default();
        assert_eq!(correlator.on_ground_truth(Position::new(100.0, 100.0, 1000), 1000), None);

        let metric = correlator
            .on_client_coordinates(Position::new(102.0, 101.0, 1050), 1062)
            .unwrap();
        assert_eq!(metric, ErrorMetric { error: 2.24, timestamp: 1062 });
    }

    #[test]
    fn no_ground_truth_means_no_metric() {
        let mut correlator = Correlator::default();
        assert_eq!(correlator.on_client_coordinates(Position::new(500.0, 400.0, 10), 10), None);
        assert_eq!(correlator.last_client(), Some(Position::new(500.0, 400.0, 10)));
    }

    #[test]
    fn ground_truth_pairs_only_with_fresh_client_sample() {
        let mut correlator = Correlator::new(100);
        correlator.on_client_coordinates(Position::new(10.0, 10.0, 1000), 1000);

        let fresh = correlator.on_ground_truth(Position::new(13.0, 14.0, 1099), 1100);
        assert_eq!(fresh, Some(ErrorMetric { error: 5.0, timestamp: 1100 }));

        let stale = correlator.on_ground_truth(Position::new(13.0, 14.0, 1100), 1101);
        assert_eq!(stale, None);
    }

    #[test]
    fn window_is_configurable() {
        let mut correlator = Correlator::new(500);
        correlator.on_client_coordinates(Position::new(0.0, 0.0, 0), 0);
        assert!(correlator.on_ground_truth(Position::new(3.0, 4.0, 400), 400).is_some());
    }

    #[test]
    fn both_triggers_fire_for_near_simultaneous_samples() {
        let mut correlator = Correlator::default();
        correlator.on_ground_truth(Position::new(0.0, 0.0, 0), 0);
        assert!(correlator.on_client_coordinates(Position::new(3.0, 4.0, 20), 20).is_some());
        assert!(correlator.on_ground_truth(Position::new(6.0, 8.0, 33), 33).is_some());
    }

    #[test]
    fn extreme_client_timestamps_do_not_overflow_the_window() {
        let mut correlator = Correlator::default();
        correlator.on_client_coordinates(Position::new(1.0, 1.0, i64::MIN), 0);
        assert_eq!(correlator.on_ground_truth(Position::new(1.0, 1.0, 1000), 1000), None);

        // A client stamp far in the future still pairs; the difference is negative
        correlator.on_client_coordinates(Position::new(1.0, 1.0, i64::MAX), 1001);
        let metric = correlator.on_ground_truth(Position::new(4.0, 5.0, i64::MIN), 1002);
        assert_eq!(metric, Some(ErrorMetric { error: 5.0, timestamp: 1002 }));
    }

    #[test]
    fn non_finite_error_is_never_produced() {
        let mut correlator = Correlator::default();
        correlator.on_ground_truth(Position::new(-f64::MAX, 0.0, 1000), 1000);
        assert_eq!(correlator.on_client_coordinates(Position::new(f64::MAX, 0.0, 1000), 1000), None);
        assert_eq!(correlator.on_ground_truth(Position::new(-f64::MAX, 0.0, 1010), 1010), None);

        let huge = correlator.on_client_coordinates(Position::new(1e200, 0.0, 1020), 1020);
        assert!(huge.is_some_and(|metric| metric.error.is_finite()));
    }

    proptest! {
        #[test]
        fn error_is_rounded_distance(
            px in -5000.0f64..5000.0, py in -5000.0f64..5000.0,
            ax in -5000.0f64..5000.0, ay in -5000.0f64..5000.0,
        ) {
            let metric = correlate_at(&Position::new(px, py, 1), &Position::new(ax, ay, 2), 99);
            let expected = ((px - ax).hypot(py - ay) * 100.0).round() / 100.0;
            prop_assert_eq!(metric.error, expected);
            prop_assert!(metric.error >= 0.0);
            prop_assert_eq!(metric.timestamp, 99);
        }
    }
}
