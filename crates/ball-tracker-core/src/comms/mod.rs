//! Communication layer for the ball tracker
//!
//! Wire protocol of the coordinate channel, its reconnecting client, and
//! the registry of live media connections.

/// Coordinate channel client
pub mod channel;

/// Message definitions for the coordinate channel
pub mod protocol;

/// Live connection tracking
pub mod registry;

// Re-export commonly used items
pub use channel::{ChannelState, CoordinateChannel};
pub use protocol::{parse_message, ChannelMessage, ErrorPayload, OfferConfig, OfferPayload};
pub use registry::{ConnectionRegistry, ConnectionResources};
