//! Error types for the ball tracking pipeline
//!
//! Each concern gets its own enum so callers can tell terminal channel
//! failures apart from per-message validation problems.

use crate::types::ConnectionId;

/// Rejected ball configuration
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BallConfigError {
    /// Frame rate was NaN or infinite
    #[error("frame rate must be a finite number, got {0}")]
    NonFiniteFrameRate(f64),

    /// Ball radius of zero
    #[error("ball radius must be greater than zero")]
    ZeroRadius,

    /// Ball does not fit inside the frame
    #[error("a ball of radius {radius} does not fit in a {width}x{height} frame")]
    BallDoesNotFit {
        /// Frame width
        width: u32,
        /// Frame height
        height: u32,
        /// Ball radius
        radius: u32,
    },
}

/// Failure while establishing or running a coordinate channel.
///
/// Every variant is terminal for the channel instance that produced it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChannelConnectionError {
    /// The channel did not open within the configured window
    #[error("channel did not open within {timeout_ms}ms")]
    OpenTimeout {
        /// Configured timeout
        timeout_ms: u64,
    },

    /// Reconnection gave up
    #[error("channel closed and {attempts} reconnect attempts failed")]
    ReconnectExhausted {
        /// Number of attempts made
        attempts: u32,
    },

    /// The underlying socket failed while opening
    #[error("transport error: {0}")]
    Transport(String),
}

/// A channel payload that failed schema validation
#[derive(Debug, thiserror::Error)]
pub enum MalformedMessageError {
    /// Not a well-formed `{type, payload}` envelope
    #[error("malformed channel message: {0}")]
    Json(#[from] serde_json::Error),

    /// Well-formed, but the position it carries is unusable
    #[error("invalid position in channel message: {0}")]
    Position(#[from] PositionError),
}

/// A position sample that cannot be correlated
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PositionError {
    /// NaN or infinite coordinate
    #[error("coordinates must be finite, got ({x}, {y})")]
    NonFinite {
        /// Horizontal coordinate
        x: f64,
        /// Vertical coordinate
        y: f64,
    },

    /// Coordinate too far outside any frame
    #[error("coordinates ({x}, {y}) exceed the limit of {limit} pixels")]
    OutOfRange {
        /// Horizontal coordinate
        x: f64,
        /// Vertical coordinate
        y: f64,
        /// Largest accepted absolute value
        limit: f64,
    },

    /// Timestamp before the epoch or past year 9999
    #[error("timestamp {0} is out of range")]
    TimestampOutOfRange(i64),
}

/// Errors reported by a media endpoint or the engine behind it
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    /// The remote session description could not be parsed or applied
    #[error("invalid session description: {0}")]
    InvalidSdp(String),

    /// The engine rejected an operation
    #[error("media engine error: {0}")]
    Engine(String),

    /// Operation on an endpoint that was already closed
    #[error("media endpoint is closed")]
    Closed,

    /// Socket error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Connection registry errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    /// A connection with this id is already registered
    #[error("connection {0} is already registered")]
    DuplicateConnection(ConnectionId),
}

/// Why an offer could not be turned into an answer.
///
/// Reported back to the requester as an `error` channel message.
#[derive(Debug, thiserror::Error)]
pub enum OfferHandlingError {
    /// Requested ball configuration was invalid
    #[error("invalid ball configuration: {0}")]
    InvalidConfig(#[from] BallConfigError),

    /// Offer was not a usable session description
    #[error("malformed offer: {0}")]
    MalformedOffer(String),

    /// The endpoint factory failed
    #[error("failed to create media endpoint: {0}")]
    EndpointCreation(MediaError),

    /// Applying the offer or generating the answer failed
    #[error("failed to negotiate session: {0}")]
    Negotiation(MediaError),

    /// The connection could not be registered
    #[error("failed to register connection: {0}")]
    Registration(#[from] RegistryError),
}

/// Frame buffer problems
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FrameError {
    /// Buffer holds fewer bytes than width * height * 4
    #[error("frame buffer holds {actual} bytes, expected {expected}")]
    BufferTooShort {
        /// Required length
        expected: usize,
        /// Actual length
        actual: usize,
    },
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// File was not valid TOML for the config schema
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
