//! Coordinate hub
//!
//! Holds the ClientSet (one outbound queue per open channel endpoint) and
//! the error correlator. Ground truth from the media bridge and estimates
//! from clients both land here; every resulting metric is broadcast.

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};

use ball_tracker_core::comms::ChannelMessage;
use ball_tracker_core::types::now_millis;
use ball_tracker_core::{log_debug, log_info, log_trace};
use ball_tracker_core::{ClientId, Correlator, ErrorMetric, Position};

use crate::constants::CLIENT_QUEUE_CAPACITY;

/// Connected clients plus the latest-sample correlator
pub struct CoordinateHub {
    clients: DashMap<ClientId, mpsc::Sender<String>>,
    correlator: Mutex<Correlator>,
}

impl CoordinateHub {
    /// Empty hub correlating within `window_ms`
    pub fn new(window_ms: i64) -> Self {
        Self { clients: DashMap::new(), correlator: Mutex::new(Correlator::new(window_ms)) }
    }

    /// Add a client. The returned receiver yields encoded frames to write.
    pub fn join(&self) -> (ClientId, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(CLIENT_QUEUE_CAPACITY);
        let mut id = ClientId::random();
        while self.clients.contains_key(&id) {
            id = ClientId::random();
        }
        self.clients.insert(id, tx);
        log_info!("Client {} joined ({} connected)", id, self.clients.len());
        (id, rx)
    }

    /// Remove a client. Dropping its sender ends its writer.
    pub fn leave(&self, id: &ClientId) -> bool {
        let removed = self.clients.remove(id).is_some();
        if removed {
            log_info!("Client {} left ({} connected)", id, self.clients.len());
        }
        removed
    }

    /// Number of connected clients
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Disconnect every client
    pub fn close_all(&self) {
        let count = self.clients.len();
        self.clients.clear();
        log_info!("Closed {} coordinate channel clients", count);
    }

    /// Send one message to one client. Returns `false` if it is gone or its
    /// queue is full.
    pub fn send_to(&self, id: &ClientId, message: &ChannelMessage) -> Result<bool, serde_json::Error> {
        let text = message.to_json()?;
        let Some(tx) = self.clients.get(id).map(|entry| entry.value().clone()) else {
            return Ok(false);
        };
        Ok(tx.try_send(text).is_ok())
    }

    /// Queue a message on every open client. Slow clients miss messages
    /// instead of stalling the others. Returns how many clients got it.
    pub fn broadcast(&self, message: &ChannelMessage) -> Result<usize, serde_json::Error> {
        let text = message.to_json()?;
        let mut delivered = 0;
        let mut closed = Vec::new();

        for entry in self.clients.iter() {
            match entry.value().try_send(text.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    log_trace!("Client {} queue full, dropping {}", entry.key(), message.kind());
                }
                Err(TrySendError::Closed(_)) => closed.push(*entry.key()),
            }
        }

        for id in closed {
            self.clients.remove(&id);
            log_debug!("Pruned closed client {}", id);
        }
        Ok(delivered)
    }

    /// Client estimate arrived: correlate against the latest ground truth
    pub fn handle_coordinates(&self, estimate: Position) -> Result<Option<ErrorMetric>, serde_json::Error> {
        let metric = self.correlator.lock().on_client_coordinates(estimate, now_millis());
        if let Some(metric) = metric {
            self.broadcast(&ChannelMessage::metric(metric))?;
        }
        Ok(metric)
    }

    /// Ground truth arrived: correlate against a fresh client estimate and
    /// forward the position to every listener
    pub fn update_ball_position(&self, actual: Position) -> Result<Option<ErrorMetric>, serde_json::Error> {
        let metric = self.correlator.lock().on_ground_truth(actual, now_millis());
        if let Some(metric) = metric {
            self.broadcast(&ChannelMessage::metric(metric))?;
        }
        self.broadcast(&ChannelMessage::BallPosition(actual))?;
        Ok(metric)
    }

    /// Latest ground truth seen
    pub fn last_ground_truth(&self) -> Option<Position> {
        self.correlator.lock().last_ground_truth()
    }
}
