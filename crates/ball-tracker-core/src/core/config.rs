//! Configuration for the ball tracker
//!
//! Loaded from a TOML file; every field has a default so partial files work.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use crate::constants::{
    DEFAULT_BALL_RADIUS, DEFAULT_CORRELATION_WINDOW_MS, DEFAULT_FRAME_RATE, DEFAULT_HEIGHT,
    DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_OPEN_TIMEOUT_MS, DEFAULT_RECONNECT_BACKOFF_MS,
    DEFAULT_VELOCITY, DEFAULT_WIDTH,
};
use crate::types::{BallConfig, BallConfigError, ConfigError};
use crate::{log_info, log_warn};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP / WebSocket server
    pub server: ServerConfig,

    /// Simulation and correlation
    pub tracking: TrackingConfig,

    /// Media endpoint settings
    pub webrtc: WebRtcConfig,

    /// Coordinate channel client settings
    pub client: ClientConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP server bind address
    pub http_addr: SocketAddr,

    /// Path of the coordinate channel WebSocket endpoint
    pub ws_path: String,
}

/// Simulation and correlation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Maximum gap (ms) between a ground-truth sample and the last client
    /// coordinate for the pair to be correlated
    pub correlation_window_ms: i64,

    /// Frame rate used when an offer does not carry one
    pub default_frame_rate: f64,

    /// Synthetic frame width
    pub width: u32,

    /// Synthetic frame height
    pub height: u32,

    /// Ball radius
    pub ball_radius: u32,

    /// Per-tick displacement on each axis
    pub velocity: f64,
}

/// Media endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebRtcConfig {
    /// UDP socket bind address for media endpoints
    pub udp_bind_addr: SocketAddr,

    /// Address advertised as host candidate when the bind address is unspecified
    pub public_ip: Option<IpAddr>,

    /// Run endpoints in ICE-lite mode
    pub ice_lite: bool,
}

/// Coordinate channel client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// WebSocket URL of the coordinate channel
    pub url: String,

    /// Initial open timeout in milliseconds
    pub open_timeout_ms: u64,

    /// Reconnect attempts before giving up
    pub max_reconnect_attempts: u32,

    /// Backoff unit in milliseconds; attempt `n` waits `n * backoff`
    pub reconnect_backoff_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            ws_path: "/ws".to_string(),
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            correlation_window_ms: DEFAULT_CORRELATION_WINDOW_MS,
            default_frame_rate: DEFAULT_FRAME_RATE,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            ball_radius: DEFAULT_BALL_RADIUS,
            velocity: DEFAULT_VELOCITY,
        }
    }
}

impl Default for WebRtcConfig {
    fn default() -> Self {
        Self {
            udp_bind_addr: SocketAddr::from(([0, 0, 0, 0], 0)),
            public_ip: None,
            ice_lite: true,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:5000/ws".to_string(),
            open_timeout_ms: DEFAULT_OPEN_TIMEOUT_MS,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_backoff_ms: DEFAULT_RECONNECT_BACKOFF_MS,
        }
    }
}

impl TrackingConfig {
    /// Build the ball configuration for a requested frame rate, filling
    /// geometry from this config
    pub fn ball_config(&self, frame_rate: Option<f64>) -> Result<BallConfig, BallConfigError> {
        BallConfig::new(
            frame_rate.unwrap_or(self.default_frame_rate),
            self.width,
            self.height,
            self.ball_radius,
        )
    }
}

impl ClientConfig {
    /// Open timeout as a duration
    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }

    /// Backoff before reconnect attempt `attempt` (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms.saturating_mul(u64::from(attempt)))
    }
}

/// Load configuration from file
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let config_str = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&config_str)?;
    Ok(config)
}

/// Load configuration from file or use defaults
pub fn load_config_or_default(path: Option<&str>) -> Config {
    match path {
        Some(path) => {
            match load_config(path) {
                Ok(config) => {
                    log_info!("Loaded configuration from: {}", path);
                    config
                }
                Err(e) => {
                    log_warn!("Failed to load config from {}: {}. Using defaults.", path, e);
                    Config::default()
                }
            }
        }
        None => {
            log_info!("No config file specified, using defaults");
            Config::default()
        }
    }
}
