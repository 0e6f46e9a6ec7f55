//! Media seam between the signaling bridge and a real-time media engine
//!
//! The engine itself is an external collaborator. This module defines what
//! the bridge needs from it (`MediaEndpoint`, `EndpointFactory`), the
//! session description types exchanged during signaling, and the
//! `VideoSource` that carries rendered frames to an endpoint's outgoing
//! track.

/// Raw frames and the synthetic renderer
pub mod frame;

pub use frame::{render_ball_frame, VideoFrame};

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::types::{ConnectionId, MediaError};

/// Result type for media operations
pub type MediaResult<T> = Result<T, MediaError>;

/// SDP type for session descriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    /// Offer to establish a session
    Offer,
    /// Answer to an offer
    Answer,
}

/// Session Description Protocol data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDescription {
    /// SDP type (offer or answer)
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    /// SDP content
    pub sdp: String,
}

impl SessionDescription {
    /// Wrap an SDP answer
    pub fn answer(sdp: String) -> Self {
        Self { sdp_type: SdpType::Answer, sdp }
    }
}

/// Encodes raw frames for an outgoing track.
///
/// No codec ships with the workspace; without an encoder an endpoint
/// negotiates the track but does not put media on the wire.
pub trait FrameEncoder: Send {
    /// Codec name as it appears in SDP (for example `VP8` or `H264`)
    fn codec_name(&self) -> &str;

    /// Encode one frame
    fn encode(&mut self, frame: &VideoFrame) -> MediaResult<Vec<u8>>;
}

/// Server side of one media session
pub trait MediaEndpoint: Send {
    /// Attach an outgoing video track fed by `source`
    fn add_video_track(&mut self, source: VideoSource) -> MediaResult<()>;

    /// Apply the remote offer and produce the local answer
    fn accept_offer(
        &mut self,
        offer: SessionDescription,
    ) -> Pin<Box<dyn Future<Output = MediaResult<SessionDescription>> + Send + '_>>;

    /// Whether media can currently flow
    fn is_connected(&self) -> bool;

    /// Whether the endpoint consumes frames from its video source. When it
    /// does not, the bridge skips rendering them.
    fn wants_frames(&self) -> bool {
        true
    }

    /// Release the endpoint. Closing twice is a no-op.
    fn close(&mut self) -> MediaResult<()>;
}

/// Creates endpoints for new connections
pub trait EndpointFactory: Send + Sync {
    /// Endpoint type produced
    type Endpoint: MediaEndpoint + 'static;

    /// Create a fresh endpoint for connection `id`
    fn create(&self, id: ConnectionId) -> MediaResult<Self::Endpoint>;
}

struct SourceInner {
    latest: Mutex<Option<VideoFrame>>,
    frames: AtomicU64,
    closed: AtomicBool,
    ready: Notify,
}

/// Latest-frame video source.
///
/// The producer overwrites the pending frame; the consumer always gets the
/// newest one, so a slow consumer skips frames instead of queueing them.
#[derive(Clone)]
pub struct VideoSource {
    inner: Arc<SourceInner>,
}

impl VideoSource {
    /// Create an open source with no frame yet
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SourceInner {
                latest: Mutex::new(None),
                frames: AtomicU64::new(0),
                closed: AtomicBool::new(false),
                ready: Notify::new(),
            }),
        }
    }

    /// Publish a frame. Returns `false` once the source is closed.
    pub fn on_frame(&self, frame: VideoFrame) -> bool {
        if self.is_closed() {
            return false;
        }
        *self.inner.latest.lock() = Some(frame);
        self.inner.frames.fetch_add(1, Ordering::Relaxed);
        self.inner.ready.notify_one();
        true
    }

    /// Take the pending frame, if any
    pub fn take_latest(&self) -> Option<VideoFrame> {
        self.inner.latest.lock().take()
    }

    /// Wait for the next frame; `None` once the source is closed
    pub async fn next_frame(&self) -> Option<VideoFrame> {
        loop {
            let notified = self.inner.ready.notified();
            if self.is_closed() {
                return None;
            }
            if let Some(frame) = self.take_latest() {
                return Some(frame);
            }
            notified.await;
        }
    }

    /// Number of frames published so far
    pub fn frames_published(&self) -> u64 {
        self.inner.frames.load(Ordering::Relaxed)
    }

    /// Stop accepting frames and wake any waiting consumer
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.latest.lock().take();
        self.inner.ready.notify_waiters();
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

impl Default for VideoSource {
    fn default() -> Self {
        Self::new()
    }
}
