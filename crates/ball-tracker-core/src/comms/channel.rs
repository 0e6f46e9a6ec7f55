//! Coordinate channel client
//!
//! A WebSocket client that keeps itself connected. The first open must
//! succeed within `open_timeout_ms`; after that an unexpected close starts
//! up to `max_reconnect_attempts` reconnects, attempt `n` waiting
//! `n * reconnect_backoff_ms`. When every attempt fails the channel settles
//! in `ChannelState::Failed` and reports why.

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::comms::protocol::{parse_message, ChannelMessage, ErrorPayload};
use crate::constants::OUTBOUND_QUEUE_CAPACITY;
use crate::core::config::ClientConfig;
use crate::types::{round2, ChannelConnectionError};
use crate::{log_debug, log_info, log_warn};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Handler = Arc<dyn Fn(&ChannelMessage) + Send + Sync>;

/// Lifecycle of a coordinate channel
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelState {
    /// Initial open in progress
    Connecting,
    /// Connected; sends go out
    Open,
    /// Connection dropped; waiting for or running reconnect `attempt`
    Reconnecting {
        /// 1-based attempt number
        attempt: u32,
    },
    /// Closed on request
    Closed,
    /// Gave up; the channel will not recover
    Failed(ChannelConnectionError),
}

impl ChannelState {
    /// Whether the channel has stopped for good
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChannelState::Closed | ChannelState::Failed(_))
    }
}

/// Reconnecting client end of the coordinate channel
pub struct CoordinateChannel {
    outbound: mpsc::Sender<String>,
    state: watch::Receiver<ChannelState>,
    handlers: Arc<Mutex<Vec<Handler>>>,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl CoordinateChannel {
    /// Open the channel at `config.url` and wait for the first handshake.
    ///
    /// Fails with `OpenTimeout` when the handshake does not finish inside
    /// the open timeout, or `Transport` when the socket cannot be opened.
    pub async fn connect(config: &ClientConfig) -> Result<Self, ChannelConnectionError> {
        let mut channel = Self::open(config);
        match channel.wait_for_state(|state| *state != ChannelState::Connecting).await {
            ChannelState::Failed(e) => Err(e),
            _ => Ok(channel),
        }
    }

    /// Start opening the channel in the background. The channel is
    /// `Connecting` until the first handshake finishes; sends made before
    /// then are dropped.
    pub fn open(config: &ClientConfig) -> Self {
        log_info!("Connecting coordinate channel to {}", config.url);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ChannelState::Connecting);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handlers: Arc<Mutex<Vec<Handler>>> = Arc::new(Mutex::new(Vec::new()));

        let supervisor = Supervisor {
            config: config.clone(),
            outbound: outbound_rx,
            state: state_tx,
            handlers: handlers.clone(),
            shutdown: shutdown_rx,
        };
        let task = tokio::spawn(supervisor.run());

        Self {
            outbound: outbound_tx,
            state: state_rx,
            handlers,
            shutdown: shutdown_tx,
            task: Some(task),
        }
    }

    /// Current state
    pub fn state(&self) -> ChannelState {
        self.state.borrow().clone()
    }

    /// Wait until the state satisfies `predicate` and return it
    pub async fn wait_for_state(
        &mut self,
        mut predicate: impl FnMut(&ChannelState) -> bool,
    ) -> ChannelState {
        if let Ok(state) = self.state.wait_for(|state| predicate(state)).await {
            return state.clone();
        }
        // Supervisor gone; whatever it last published is final
        self.state()
    }

    /// Send a message. Returns `false`, with a warning, when the channel is
    /// not open or the outbound queue is full.
    pub fn send(&self, message: &ChannelMessage) -> bool {
        let state = self.state();
        if state != ChannelState::Open {
            log_warn!("Dropping {} message: channel is {:?}", message.kind(), state);
            return false;
        }
        let text = match message.to_json() {
            Ok(text) => text,
            Err(e) => {
                log_warn!("Failed to encode {} message: {}", message.kind(), e);
                return false;
            }
        };
        match self.outbound.try_send(text) {
            Ok(()) => true,
            Err(e) => {
                log_warn!("Dropping {} message: {}", message.kind(), e);
                false
            }
        }
    }

    /// Register a handler for every validated inbound message
    pub fn on_message(&self, handler: impl Fn(&ChannelMessage) + Send + Sync + 'static) {
        self.handlers.lock().push(Arc::new(handler));
    }

    /// Close the channel and wait for the background task to finish
    pub async fn close(&mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for CoordinateChannel {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn open_socket(config: &ClientConfig) -> Result<Socket, ChannelConnectionError> {
    match tokio::time::timeout(config.open_timeout(), connect_async(config.url.as_str())).await {
        Ok(Ok((socket, _response))) => Ok(socket),
        Ok(Err(e)) => Err(ChannelConnectionError::Transport(e.to_string())),
        Err(_) => Err(ChannelConnectionError::OpenTimeout { timeout_ms: config.open_timeout_ms }),
    }
}

enum SessionEnd {
    /// Closed on request or the owning channel went away
    Requested,
    /// Peer closed or the socket failed
    Dropped,
}

struct Supervisor {
    config: ClientConfig,
    outbound: mpsc::Receiver<String>,
    state: watch::Sender<ChannelState>,
    handlers: Arc<Mutex<Vec<Handler>>>,
    shutdown: watch::Receiver<bool>,
}

impl Supervisor {
    async fn run(mut self) {
        let opened = tokio::select! {
            opened = open_socket(&self.config) => opened,
            _ = self.shutdown.changed() => {
                self.state.send_replace(ChannelState::Closed);
                return;
            }
        };
        let mut socket = match opened {
            Ok(socket) => socket,
            Err(e) => {
                log_warn!("Coordinate channel failed to open: {}", e);
                self.state.send_replace(ChannelState::Failed(e));
                return;
            }
        };
        log_info!("Coordinate channel open");
        self.state.send_replace(ChannelState::Open);

        loop {
            if let SessionEnd::Requested = self.session(socket).await {
                log_info!("Coordinate channel closed");
                self.state.send_replace(ChannelState::Closed);
                return;
            }
            log_warn!("Coordinate channel dropped");

            match self.reconnect().await {
                Ok(Some(next)) => {
                    let stale = discard_pending(&mut self.outbound);
                    if stale > 0 {
                        log_warn!("Discarded {} messages queued before the channel dropped", stale);
                    }
                    log_info!("Coordinate channel reopened");
                    self.state.send_replace(ChannelState::Open);
                    socket = next;
                }
                Ok(None) => {
                    self.state.send_replace(ChannelState::Closed);
                    return;
                }
                Err(e) => {
                    log_warn!("Coordinate channel failed: {}", e);
                    self.state.send_replace(ChannelState::Failed(e));
                    return;
                }
            }
        }
    }

    /// `Ok(None)` when a close was requested while waiting
    async fn reconnect(&mut self) -> Result<Option<Socket>, ChannelConnectionError> {
        let attempts = self.config.max_reconnect_attempts;
        for attempt in 1..=attempts {
            self.state.send_replace(ChannelState::Reconnecting { attempt });
            let backoff = self.config.backoff_for(attempt);
            log_debug!("Reconnect attempt {}/{} in {:?}", attempt, attempts, backoff);

            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                _ = self.shutdown.changed() => return Ok(None),
            }

            match open_socket(&self.config).await {
                Ok(socket) => return Ok(Some(socket)),
                Err(e) => log_warn!("Reconnect attempt {} failed: {}", attempt, e),
            }
        }
        Err(ChannelConnectionError::ReconnectExhausted { attempts })
    }

    async fn session(&mut self, socket: Socket) -> SessionEnd {
        let (mut sink, mut stream) = socket.split();
        loop {
            tokio::select! {
                outbound = self.outbound.recv() => {
                    let Some(text) = outbound else {
                        let _ = sink.send(Message::Close(None)).await;
                        return SessionEnd::Requested;
                    };
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        log_warn!("Coordinate channel send failed: {}", e);
                        return SessionEnd::Dropped;
                    }
                }
                inbound = stream.next() => match inbound {
                    Some(Ok(Message::Text(text))) => self.dispatch(&text),
                    Some(Ok(Message::Close(_))) | None => return SessionEnd::Dropped,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        log_warn!("Coordinate channel read failed: {}", e);
                        return SessionEnd::Dropped;
                    }
                },
                _ = self.shutdown.changed() => {
                    let _ = sink.send(Message::Close(None)).await;
                    return SessionEnd::Requested;
                }
            }
        }
    }

    fn dispatch(&self, text: &str) {
        let message = match parse_message(text) {
            Ok(message) => message,
            Err(e) => {
                log_warn!("Ignoring inbound message: {}", e);
                return;
            }
        };
        let Some(message) = validate_inbound(message) else {
            return;
        };

        let handlers: Vec<Handler> = self.handlers.lock().clone();
        for handler in handlers {
            handler(&message);
        }
    }
}

/// Drop whatever is still queued. Sends are at-most-once, so nothing
/// accepted before a drop may go out on the next connection.
fn discard_pending(outbound: &mut mpsc::Receiver<String>) -> usize {
    let mut discarded = 0;
    while outbound.try_recv().is_ok() {
        discarded += 1;
    }
    discarded
}

/// Metric payloads must carry a finite, non-negative error; it is
/// re-rounded to two decimals for display.
fn validate_inbound(message: ChannelMessage) -> Option<ChannelMessage> {
    match message {
        ChannelMessage::Error(ErrorPayload::Metric(mut metric)) => {
            if !metric.error.is_finite() || metric.error < 0.0 {
                log_warn!("Ignoring invalid error metric {}", metric.error);
                return None;
            }
            metric.error = round2(metric.error);
            Some(ChannelMessage::metric(metric))
        }
        other => Some(other),
    }
}
