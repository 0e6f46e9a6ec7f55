//! Global constants used throughout the ball tracker
//!
//! Defaults for frame geometry, timing and channel behaviour. Most of them
//! can be overridden through the configuration file.

/// Base62 character set used for human-readable IDs
pub const BASE62_CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Length of ID8 in bytes (8 characters)
///
/// Used for channel endpoint identifiers.
pub const ID8_LENGTH: usize = 8;

/// Length of ID16 in bytes (16 characters)
///
/// Used for media connection identifiers.
pub const ID16_LENGTH: usize = 16;

/// Lowest frame rate a simulator accepts
pub const MIN_FRAME_RATE: f64 = 1.0;

/// Highest frame rate a simulator accepts
pub const MAX_FRAME_RATE: f64 = 60.0;

/// Frame rate used when the client does not ask for one
pub const DEFAULT_FRAME_RATE: f64 = 30.0;

/// Default synthetic frame width in pixels
pub const DEFAULT_WIDTH: u32 = 640;

/// Default synthetic frame height in pixels
pub const DEFAULT_HEIGHT: u32 = 480;

/// Default ball radius in pixels
pub const DEFAULT_BALL_RADIUS: u32 = 20;

/// Per-tick displacement on each axis
pub const DEFAULT_VELOCITY: f64 = 5.0;

/// Maximum age difference (ms) between a ground-truth sample and the last
/// client coordinate for the pair to be correlated
pub const DEFAULT_CORRELATION_WINDOW_MS: i64 = 100;

/// Largest absolute pixel coordinate accepted from a peer
pub const MAX_COORDINATE: f64 = 1_000_000.0;

/// Latest timestamp accepted from a peer (9999-12-31T23:59:59.999Z, in ms)
pub const MAX_TIMESTAMP_MS: i64 = 253_402_300_799_999;

/// Red channel must exceed this value for a pixel to count as ball
pub const BALL_BRIGHTNESS_FLOOR: u8 = 200;

/// Red channel must exceed `BALL_DOMINANCE` times green and blue
pub const BALL_DOMINANCE: u16 = 2;

/// Bytes per RGBA pixel
pub const BYTES_PER_PIXEL: usize = 4;

/// Coordinate channel must open within this window (ms)
pub const DEFAULT_OPEN_TIMEOUT_MS: u64 = 5_000;

/// Reconnect attempts before a channel gives up
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Backoff unit between reconnect attempts (ms), multiplied by the attempt number
pub const DEFAULT_RECONNECT_BACKOFF_MS: u64 = 1_000;

/// Capacity of per-endpoint outbound message queues
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// Capacity of the simulator position queue
pub const POSITION_QUEUE_CAPACITY: usize = 64;
