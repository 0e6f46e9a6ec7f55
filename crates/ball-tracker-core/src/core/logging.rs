//! Logging macros
//!
//! Every crate in the workspace logs through these so call sites stay the
//! same whichever subscriber a binary installs. They resolve `tracing`
//! through this crate, so dependents do not need it in their manifest.

/// Macros exported at the crate root
pub mod logging {

    /// Lifecycle events: connections opened, offers answered, shutdown
    #[macro_export]
    macro_rules! log_info {
        ($($arg:tt)*) => {
            $crate::tracing::info!($($arg)*)
        };
    }

    /// Recoverable trouble: dropped messages, failed releases
    #[macro_export]
    macro_rules! log_warn {
        ($($arg:tt)*) => {
            $crate::tracing::warn!($($arg)*)
        };
    }

    /// Failures reported back to a peer or ending a task
    #[macro_export]
    macro_rules! log_error {
        ($($arg:tt)*) => {
            $crate::tracing::error!($($arg)*)
        };
    }

    /// Per-connection detail
    #[macro_export]
    macro_rules! log_debug {
        ($($arg:tt)*) => {
            $crate::tracing::debug!($($arg)*)
        };
    }

    /// Per-tick and per-frame detail
    #[macro_export]
    macro_rules! log_trace {
        ($($arg:tt)*) => {
            $crate::tracing::trace!($($arg)*)
        };
    }
}
