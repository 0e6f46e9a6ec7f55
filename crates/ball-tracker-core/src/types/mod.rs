/// Type definitions for the ball tracker
///
/// This module contains all shared type definitions organized by category.

/// Identifier types
pub mod ids;
/// Position, metric and configuration types
pub mod position;
/// System-wide error types
pub mod error;

/// Media connection identifier
pub type ConnectionId = ids::ID16;

/// Coordinate channel endpoint identifier
pub type ClientId = ids::ID8;

// Re-export commonly used types for convenience
pub use ids::{ID8, ID16};
pub use position::{now_millis, round2, BallConfig, ErrorMetric, Point, Position};
pub use error::{
    BallConfigError, ChannelConnectionError, ConfigError, FrameError, MalformedMessageError,
    MediaError, OfferHandlingError, PositionError, RegistryError,
};
