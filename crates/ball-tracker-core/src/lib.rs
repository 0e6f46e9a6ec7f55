//! # Ball Tracker Core
//!
//! Core types and logic for the bouncing-ball tracking pipeline: the motion
//! simulator, frame rendering and position estimation, error correlation,
//! the coordinate channel protocol and client, and the connection registry.

#![warn(missing_docs)]

#[doc(hidden)]
pub use tracing;

/// System constants
pub mod constants;

/// Type definitions shared across the pipeline
pub mod types;

/// Configuration and logging
pub mod core;

/// Ball motion simulation
pub mod simulator;

/// Position estimation from frames
pub mod estimator;

/// Media seam, frames and video sources
pub mod media;

/// Ground truth / estimate correlation
pub mod correlator;

/// Coordinate channel and connection registry
pub mod comms;

// Re-export commonly used items
pub use types::{BallConfig, ClientId, ConnectionId, ErrorMetric, Point, Position};
pub use crate::core::{load_config, load_config_or_default, Config};
pub use correlator::Correlator;
pub use simulator::{Simulator, SimulatorHandle};
pub use estimator::{ColorThresholdEstimator, PositionEstimator};
