//! Central application state
//!
//! One `AppState` per server instance. Connected clients, the last samples
//! and live media connections all hang off it, so several isolated servers
//! can run in one process.

use std::sync::Arc;
use std::time::Instant;

use ball_tracker_core::media::EndpointFactory;
use ball_tracker_core::Config;

use crate::channel::CoordinateHub;
use crate::webrtc::{MediaBridge, Str0mEndpointFactory};

/// Shared state handed to every route
pub struct AppState<F: EndpointFactory> {
    /// Application configuration
    pub config: Config,

    /// Coordinate channel clients and the error correlator
    pub hub: Arc<CoordinateHub>,

    /// Media signaling bridge and its connection registry
    pub bridge: MediaBridge<F>,

    /// When the state was built
    pub started_at: Instant,
}

impl<F: EndpointFactory> AppState<F> {
    /// Build state around an endpoint factory
    pub fn new(config: Config, factory: F) -> Self {
        let hub = Arc::new(CoordinateHub::new(config.tracking.correlation_window_ms));
        let bridge = MediaBridge::new(factory, config.tracking.clone(), hub.clone());
        Self { config, hub, bridge, started_at: Instant::now() }
    }

    /// Ordered teardown: channel clients first, then media connections.
    /// Returns how many media connections were released.
    pub fn shutdown(&self) -> usize {
        self.hub.close_all();
        self.bridge.cleanup()
    }
}

/// Create the production state, backed by str0m endpoints
pub fn create_app_state(config: Config) -> Arc<AppState<Str0mEndpointFactory>> {
    let factory = Str0mEndpointFactory::new(config.webrtc.clone());
    Arc::new(AppState::new(config, factory))
}
