// Constants for the server

/// Payload of the `error` message sent when an offer cannot be answered
pub const OFFER_FAILURE_MESSAGE: &str = "Failed to process WebRTC offer";

/// Per-client outbound queue depth on the coordinate channel
pub const CLIENT_QUEUE_CAPACITY: usize = 256;

/// How long shutdown waits for the HTTP server to drain
pub const SHUTDOWN_GRACE_SECS: u64 = 5;

/// Receive buffer for media UDP sockets
pub const UDP_RECV_BUFFER: usize = 2000;
