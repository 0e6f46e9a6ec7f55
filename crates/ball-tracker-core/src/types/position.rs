//! Position samples, error metrics and ball configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{
    DEFAULT_BALL_RADIUS, DEFAULT_FRAME_RATE, DEFAULT_HEIGHT, DEFAULT_WIDTH, MAX_COORDINATE,
    MAX_FRAME_RATE, MAX_TIMESTAMP_MS, MIN_FRAME_RATE,
};
use crate::types::error::{BallConfigError, PositionError};

/// Current wall-clock time in integer milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A ball position sample, either simulated ground truth or a client estimate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal pixel coordinate
    pub x: f64,
    /// Vertical pixel coordinate
    pub y: f64,
    /// Capture time in milliseconds
    pub timestamp: i64,
}

impl Position {
    /// Create a sample
    pub fn new(x: f64, y: f64, timestamp: i64) -> Self {
        Self { x, y, timestamp }
    }

    /// Euclidean distance to another sample, ignoring timestamps
    pub fn distance_to(&self, other: &Position) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Check a sample received from a peer: finite coordinates within
    /// `MAX_COORDINATE` and a timestamp between the epoch and year 9999
    pub fn validate(&self) -> Result<(), PositionError> {
        if !self.x.is_finite() || !self.y.is_finite() {
            return Err(PositionError::NonFinite { x: self.x, y: self.y });
        }
        if self.x.abs() > MAX_COORDINATE || self.y.abs() > MAX_COORDINATE {
            return Err(PositionError::OutOfRange { x: self.x, y: self.y, limit: MAX_COORDINATE });
        }
        if !(0..=MAX_TIMESTAMP_MS).contains(&self.timestamp) {
            return Err(PositionError::TimestampOutOfRange(self.timestamp));
        }
        Ok(())
    }
}

/// A 2D point without a timestamp, as produced by an estimator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal pixel coordinate
    pub x: f64,
    /// Vertical pixel coordinate
    pub y: f64,
}

impl Point {
    /// Attach a timestamp
    pub fn at(self, timestamp: i64) -> Position {
        Position::new(self.x, self.y, timestamp)
    }
}

/// Tracking error between a predicted and an actual position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorMetric {
    /// Distance in pixels, rounded to two decimals
    pub error: f64,
    /// Time the correlation happened, in milliseconds
    pub timestamp: i64,
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    // Past 2^52 there is no fractional part left to round
    if !value.is_finite() || value.abs() >= 4_503_599_627_370_496.0 {
        return value;
    }
    (value * 100.0).round() / 100.0
}

/// Per-connection simulator configuration.
///
/// Fixes tick rate and frame geometry for the lifetime of a connection.
/// Only constructible through [`BallConfig::new`], so it is never deserialized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BallConfig {
    frame_rate: f64,
    width: u32,
    height: u32,
    ball_radius: u32,
}

impl BallConfig {
    /// Build a validated configuration.
    ///
    /// Finite frame rates are clamped into `1..=60`; the ball must fit
    /// inside the frame with room to move on both axes.
    pub fn new(frame_rate: f64, width: u32, height: u32, ball_radius: u32) -> Result<Self, BallConfigError> {
        let frame_rate = normalize_frame_rate(frame_rate)?;
        if ball_radius == 0 {
            return Err(BallConfigError::ZeroRadius);
        }
        let diameter = u64::from(ball_radius) * 2;
        if diameter >= u64::from(width) || diameter >= u64::from(height) {
            return Err(BallConfigError::BallDoesNotFit { width, height, radius: ball_radius });
        }
        Ok(Self { frame_rate, width, height, ball_radius })
    }

    /// Frames (and simulator ticks) per second
    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    /// Frame width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Ball radius in pixels
    pub fn ball_radius(&self) -> u32 {
        self.ball_radius
    }

    /// Time between simulator ticks (`1000 / frameRate` ms)
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate)
    }
}

impl Default for BallConfig {
    fn default() -> Self {
        Self {
            frame_rate: DEFAULT_FRAME_RATE,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            ball_radius: DEFAULT_BALL_RADIUS,
        }
    }
}

/// Clamp a requested frame rate into the supported range
pub fn normalize_frame_rate(frame_rate: f64) -> Result<f64, BallConfigError> {
    if !frame_rate.is_finite() {
        return Err(BallConfigError::NonFiniteFrameRate(frame_rate));
    }
    Ok(frame_rate.clamp(MIN_FRAME_RATE, MAX_FRAME_RATE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rate_is_clamped() {
        assert_eq!(normalize_frame_rate(0.0).unwrap(), 1.0);
        assert_eq!(normalize_frame_rate(120.0).unwrap(), 60.0);
        assert_eq!(normalize_frame_rate(24.0).unwrap(), 24.0);
        assert!(normalize_frame_rate(f64::NAN).is_err());
        assert!(normalize_frame_rate(f64::INFINITY).is_err());
    }

    #[test]
    fn config_rejects_ball_that_cannot_move() {
        assert_eq!(BallConfig::new(30.0, 640, 480, 0), Err(BallConfigError::ZeroRadius));
        assert!(matches!(
            BallConfig::new(30.0, 40, 480, 20),
            Err(BallConfigError::BallDoesNotFit { .. })
        ));
        assert!(BallConfig::new(30.0, 41, 41, 20).is_ok());
    }

    #[test]
    fn tick_interval_follows_frame_rate() {
        let config = BallConfig::new(50.0, 640, 480, 20).unwrap();
        assert!((config.tick_interval().as_secs_f64() - 0.020).abs() < 1e-9);
    }

    #[test]
    fn config_serializes_camel_case() {
        let json = serde_json::to_value(BallConfig::default()).unwrap();
        assert_eq!(json["frameRate"], 30.0);
        assert_eq!(json["ballRadius"], 20);
    }

    #[test]
    fn peer_samples_must_be_finite_and_in_range() {
        assert!(Position::new(320.0, -15.5, 1_700_000_000_000).validate().is_ok());
        assert!(matches!(
            Position::new(f64::NAN, 0.0, 1).validate(),
            Err(PositionError::NonFinite { .. })
        ));
        assert!(matches!(
            Position::new(1e200, 0.0, 1).validate(),
            Err(PositionError::OutOfRange { .. })
        ));
        assert_eq!(
            Position::new(1.0, 1.0, i64::MIN).validate(),
            Err(PositionError::TimestampOutOfRange(i64::MIN))
        );
        assert_eq!(
            Position::new(1.0, 1.0, i64::MAX).validate(),
            Err(PositionError::TimestampOutOfRange(i64::MAX))
        );
    }

    #[test]
    fn distance_does_not_overflow_for_large_coordinates() {
        let far = Position::new(1e200, 0.0, 0).distance_to(&Position::new(100.0, 100.0, 0));
        assert!(far.is_finite());
        assert_eq!(Position::new(3.0, 4.0, 0).distance_to(&Position::new(0.0, 0.0, 0)), 5.0);
    }

    #[test]
    fn round2_matches_fixed_point_display() {
        assert_eq!(round2(5f64.sqrt()), 2.24);
        assert_eq!(round2(0.0), 0.0);
        assert_eq!(round2(3.14159), 3.14);
        assert_eq!(round2(1e300), 1e300);
        assert_eq!(round2(f64::MAX), f64::MAX);
    }
}
