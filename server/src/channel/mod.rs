//! Coordinate channel, server side
//!
//! The hub owns the set of connected clients and the correlator; the socket
//! module runs one WebSocket endpoint per client on top of it.

/// Client set, broadcast and correlation
pub mod hub;

/// WebSocket endpoint
pub mod socket;

// Re-export commonly used items
pub use hub::CoordinateHub;
pub use socket::ws_handler;
