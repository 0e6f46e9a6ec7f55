//! # Ball Tracker Server
//!
//! Native server for the ball tracker: the HTTP API, the coordinate channel
//! WebSocket endpoint, and the media signaling bridge backed by str0m.

#![warn(missing_docs)]

/// HTTP API handlers and routing
pub mod api;

/// Coordinate channel hub and WebSocket endpoint
pub mod channel;

/// Application constants
pub mod constants;

/// Application state
pub mod core;

/// Media signaling bridge and str0m endpoints
pub mod webrtc;

pub use crate::core::AppState;
