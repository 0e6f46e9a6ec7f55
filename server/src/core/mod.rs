//! Server state and its construction

/// Application state shared by every handler
pub mod app_state;

// Re-export commonly used items
pub use app_state::{create_app_state, AppState};
