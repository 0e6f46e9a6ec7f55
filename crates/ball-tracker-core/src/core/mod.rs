//! Core application plumbing: configuration and logging

/// Application configuration
pub mod config;

/// Logging macros
pub mod logging;

// Re-export commonly used items
pub use config::{Config, load_config, load_config_or_default};
