//! HTTP API module for the ball tracker server

/// HTTP request handlers
pub mod handlers;

/// HTTP server implementation
pub mod server;

// Re-export commonly used items
pub use handlers::*;
pub use server::*;
