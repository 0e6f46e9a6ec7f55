//! Ball position estimation from pixel data
//!
//! Estimators are pluggable; the default classifies strongly red pixels as
//! ball and returns their centroid.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::constants::{BALL_BRIGHTNESS_FLOOR, BALL_DOMINANCE, BYTES_PER_PIXEL};
use crate::media::frame::frame_len;
use crate::media::VideoFrame;
use crate::types::{FrameError, Point};

/// Turns a frame into a best-guess ball centre
pub trait PositionEstimator: Send + Sync {
    /// Estimate the ball centre in a `width x height` RGBA buffer
    fn estimate(&self, rgba: &[u8], width: u32, height: u32) -> Result<Point, FrameError>;

    /// Estimate the ball centre in a frame
    fn estimate_frame(&self, frame: &VideoFrame) -> Result<Point, FrameError> {
        self.estimate(frame.data(), frame.width(), frame.height())
    }
}

/// Colour-threshold centroid estimator.
///
/// A pixel is ball when red exceeds `brightness_floor` and is more than
/// `dominance` times both green and blue. With no ball pixel the frame
/// centre is returned.
#[derive(Debug, Clone, Copy)]
pub struct ColorThresholdEstimator {
    brightness_floor: u8,
    dominance: u16,
}

impl ColorThresholdEstimator {
    /// Estimator with custom thresholds
    pub fn new(brightness_floor: u8, dominance: u16) -> Self {
        Self { brightness_floor, dominance }
    }

    #[inline(always)]
    fn is_ball(&self, r: u8, g: u8, b: u8) -> bool {
        let r16 = u16::from(r);
        r > self.brightness_floor
            && r16 > u16::from(g) * self.dominance
            && r16 > u16::from(b) * self.dominance
    }
}

impl Default for ColorThresholdEstimator {
    fn default() -> Self {
        Self::new(BALL_BRIGHTNESS_FLOOR, BALL_DOMINANCE)
    }
}

impl PositionEstimator for ColorThresholdEstimator {
    fn estimate(&self, rgba: &[u8], width: u32, height: u32) -> Result<Point, FrameError> {
        let expected = frame_len(width, height);
        if rgba.len() < expected {
            return Err(FrameError::BufferTooShort { expected, actual: rgba.len() });
        }
        let centre = Point { x: f64::from(width) / 2.0, y: f64::from(height) / 2.0 };
        if expected == 0 {
            return Ok(centre);
        }

        let mut sum_x = 0u64;
        let mut sum_y = 0u64;
        let mut count = 0u64;

        for (row, line) in rgba[..expected]
            .chunks_exact(width as usize * BYTES_PER_PIXEL)
            .enumerate()
        {
            for (col, px) in line.chunks_exact(BYTES_PER_PIXEL).enumerate() {
                if self.is_ball(px[0], px[1], px[2]) {
                    sum_x += col as u64;
                    sum_y += row as u64;
                    count += 1;
                }
            }
        }

        if count == 0 {
            return Ok(centre);
        }

        Ok(Point {
            x: (sum_x as f64 / count as f64).round(),
            y: (sum_y as f64 / count as f64).round(),
        })
    }
}

/// Rejects re-entrant estimation for one caller.
///
/// `try_estimate` returns `None` while a previous call through the same
/// guard is still running, so a slow estimate causes a skipped frame rather
/// than overlapping scans.
pub struct EstimationGuard<E> {
    estimator: E,
    busy: AtomicBool,
}

impl<E: PositionEstimator> EstimationGuard<E> {
    /// Wrap an estimator
    pub fn new(estimator: E) -> Self {
        Self { estimator, busy: AtomicBool::new(false) }
    }

    /// Estimate unless another estimate is in flight
    pub fn try_estimate(&self, frame: &VideoFrame) -> Option<Result<Point, FrameError>> {
        if self.busy.swap(true, Ordering::AcqRel) {
            return None;
        }
        // Cleared on unwind too, so a panicking estimator does not wedge the guard
        let _busy = BusyFlag(&self.busy);
        Some(self.estimator.estimate_frame(frame))
    }

    /// Whether an estimate is currently running
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

struct BusyFlag<'a>(&'a AtomicBool);

impl Drop for BusyFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
