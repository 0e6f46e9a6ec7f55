//! Media signaling
//!
//! The bridge answers offers and owns live media connections; the str0m
//! module provides the production endpoints.

/// Offer handling and connection lifecycle
pub mod bridge;

/// str0m-backed endpoints
pub mod str0m_connection;

pub use bridge::{MediaBridge, MediaConnection};
pub use str0m_connection::{EncoderFactory, Str0mEndpoint, Str0mEndpointFactory};
