//! Media signaling bridge
//!
//! Turns an offer into an answer and a running media connection: a fresh
//! endpoint, a simulator for the requested frame rate, and a pump task that
//! renders every simulated position into the connection's video source and
//! reports it to the hub as ground truth.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use ball_tracker_core::comms::{ConnectionRegistry, ConnectionResources};
use ball_tracker_core::core::config::TrackingConfig;
use ball_tracker_core::media::{
    render_ball_frame, EndpointFactory, MediaEndpoint, SdpType, SessionDescription, VideoSource,
};
use ball_tracker_core::types::{MediaError, OfferHandlingError};
use ball_tracker_core::{log_debug, log_error, log_info, log_warn};
use ball_tracker_core::{BallConfig, ClientId, ConnectionId, Position, Simulator, SimulatorHandle};

use crate::channel::CoordinateHub;

/// Everything one media connection owns
pub struct MediaConnection<E: MediaEndpoint> {
    binding: Option<ClientId>,
    simulator: SimulatorHandle,
    pump: Option<JoinHandle<()>>,
    source: VideoSource,
    endpoint: E,
    released: bool,
}

impl<E: MediaEndpoint> MediaConnection<E> {
    /// Whether the endpoint reports an established session
    pub fn is_connected(&self) -> bool {
        self.endpoint.is_connected()
    }
}

impl<E: MediaEndpoint> ConnectionResources for MediaConnection<E> {
    fn binding(&self) -> Option<ClientId> {
        self.binding
    }

    /// Stop the simulator, close the source, close the endpoint
    fn release(&mut self) -> Result<(), MediaError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.simulator.stop();
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        self.source.close();
        self.endpoint.close()
    }
}

impl<E: MediaEndpoint> Drop for MediaConnection<E> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log_warn!("Failed to release dropped media connection: {}", e);
        }
    }
}

/// Offer/answer handling plus the registry of live connections
pub struct MediaBridge<F: EndpointFactory> {
    factory: F,
    tracking: TrackingConfig,
    hub: Arc<CoordinateHub>,
    registry: ConnectionRegistry<MediaConnection<F::Endpoint>>,
}

impl<F: EndpointFactory> MediaBridge<F> {
    /// Bridge creating endpoints through `factory` and feeding ground truth
    /// into `hub`
    pub fn new(factory: F, tracking: TrackingConfig, hub: Arc<CoordinateHub>) -> Self {
        Self { factory, tracking, hub, registry: ConnectionRegistry::new() }
    }

    /// Answer an offer and start streaming.
    ///
    /// `binding` names the channel endpoint the offer came through, so its
    /// connections can be torn down when it closes. On any failure every
    /// resource created so far is released and nothing is registered.
    pub async fn handle_offer(
        &self,
        offer: SessionDescription,
        frame_rate: Option<f64>,
        binding: Option<ClientId>,
    ) -> Result<SessionDescription, OfferHandlingError> {
        if offer.sdp_type != SdpType::Offer {
            return Err(OfferHandlingError::MalformedOffer(format!(
                "expected an offer, got {:?}",
                offer.sdp_type
            )));
        }
        if offer.sdp.trim().is_empty() {
            return Err(OfferHandlingError::MalformedOffer("empty SDP".to_string()));
        }
        let ball = self.tracking.ball_config(frame_rate)?;

        let id = ConnectionId::random();
        let endpoint = self.factory.create(id).map_err(OfferHandlingError::EndpointCreation)?;
        let source = VideoSource::new();
        let frames = endpoint.wants_frames().then(|| source.clone());
        let (simulator, positions) = Simulator::start(ball, self.tracking.velocity);
        let pump = tokio::spawn(pump_frames(ball, positions, frames, self.hub.clone()));

        let mut connection = MediaConnection {
            binding,
            simulator,
            pump: Some(pump),
            source: source.clone(),
            endpoint,
            released: false,
        };

        // Dropping `connection` on an early return releases it
        connection
            .endpoint
            .add_video_track(source)
            .map_err(OfferHandlingError::Negotiation)?;
        let answer = connection
            .endpoint
            .accept_offer(offer)
            .await
            .map_err(OfferHandlingError::Negotiation)?;

        self.registry.register(id, connection)?;
        log_info!(
            "Media connection {} streaming {}x{} at {} fps",
            id,
            ball.width(),
            ball.height(),
            ball.frame_rate()
        );
        Ok(answer)
    }

    /// Release every connection. Safe to call repeatedly.
    pub fn cleanup(&self) -> usize {
        let released = self.registry.cleanup_all();
        if released > 0 {
            log_info!("Released {} media connections", released);
        }
        released
    }

    /// Release one connection
    pub fn close(&self, id: &ConnectionId) -> bool {
        self.registry.release(id)
    }

    /// Release every connection created through `client`
    pub fn close_bound_to(&self, client: &ClientId) -> usize {
        let released = self.registry.remove_bound_to(client);
        if released > 0 {
            log_debug!("Released {} media connections of client {}", released, client);
        }
        released
    }

    /// Number of live connections
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Ids of live connections
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        let mut ids = Vec::with_capacity(self.registry.len());
        self.registry.for_each(|id, _| ids.push(*id));
        ids
    }
}

/// Forward simulator positions as ground truth, rendering a frame for each
/// one when `source` is set. Rendering runs on the blocking pool.
async fn pump_frames(
    config: BallConfig,
    mut positions: mpsc::Receiver<Position>,
    source: Option<VideoSource>,
    hub: Arc<CoordinateHub>,
) {
    while let Some(position) = positions.recv().await {
        if let Some(source) = &source {
            let frame = match tokio::task::spawn_blocking(move || render_ball_frame(&config, &position)).await {
                Ok(frame) => frame,
                Err(e) => {
                    log_error!("Frame rendering failed: {}", e);
                    break;
                }
            };
            if !source.on_frame(frame) {
                break;
            }
        }
        if let Err(e) = hub.update_ball_position(position) {
            log_error!("Failed to publish ground truth: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ball_tracker_core::comms::{parse_message, ChannelMessage};
    use ball_tracker_core::media::MediaResult;
    use ball_tracker_core::types::BallConfigError;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    #[derive(Default)]
    struct Counters {
        created: AtomicUsize,
        closed: AtomicUsize,
        fail_negotiation: AtomicBool,
        no_frames: AtomicBool,
        last_source: parking_lot::Mutex<Option<VideoSource>>,
    }

    struct FakeEndpoint {
        counters: Arc<Counters>,
        source: Option<VideoSource>,
        closed: bool,
    }

    impl MediaEndpoint for FakeEndpoint {
        fn add_video_track(&mut self, source: VideoSource) -> MediaResult<()> {
            *self.counters.last_source.lock() = Some(source.clone());
            self.source = Some(source);
            Ok(())
        }

        fn accept_offer(
            &mut self,
            offer: SessionDescription,
        ) -> Pin<Box<dyn Future<Output = MediaResult<SessionDescription>> + Send + '_>> {
            let fail = self.counters.fail_negotiation.load(Ordering::SeqCst);
            Box::pin(async move {
                if fail {
                    return Err(MediaError::InvalidSdp("rejected".into()));
                }
                Ok(SessionDescription::answer(format!("answer to {}", offer.sdp)))
            })
        }

        fn is_connected(&self) -> bool {
            !self.closed
        }

        fn wants_frames(&self) -> bool {
            !self.counters.no_frames.load(Ordering::SeqCst)
        }

        fn close(&mut self) -> MediaResult<()> {
            if !self.closed {
                self.closed = true;
                self.counters.closed.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    struct FakeFactory(Arc<Counters>);

    impl EndpointFactory for FakeFactory {
        type Endpoint = FakeEndpoint;

        fn create(&self, _id: ConnectionId) -> MediaResult<FakeEndpoint> {
            self.0.created.fetch_add(1, Ordering::SeqCst);
            Ok(FakeEndpoint { counters: self.0.clone(), source: None, closed: false })
        }
    }

    fn bridge() -> (MediaBridge<FakeFactory>, Arc<Counters>, Arc<CoordinateHub>) {
        let counters = Arc::new(Counters::default());
        let hub = Arc::new(CoordinateHub::new(100));
        let bridge = MediaBridge::new(FakeFactory(counters.clone()), TrackingConfig::default(), hub.clone());
        (bridge, counters, hub)
    }

    fn offer() -> SessionDescription {
        SessionDescription { sdp_type: SdpType::Offer, sdp: "v=0".into() }
    }

    #[tokio::test]
    async fn answered_offer_is_registered_and_streams_ground_truth() {
        let (bridge, _counters, hub) = bridge();
        let (_listener, mut rx) = hub.join();

        let answer = assert_ok!(bridge.handle_offer(offer(), Some(60.0), None).await);
        assert_eq!(answer.sdp_type, SdpType::Answer);
        assert_eq!(answer.sdp, "answer to v=0");
        assert_eq!(bridge.connection_count(), 1);

        let text = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
        assert!(matches!(parse_message(&text).unwrap(), ChannelMessage::BallPosition(_)));
        assert!(hub.last_ground_truth().is_some());
        bridge.cleanup();
    }

    #[tokio::test]
    async fn frames_are_rendered_only_for_consuming_endpoints() {
        let (bridge, counters, hub) = bridge();
        let (_listener, mut rx) = hub.join();

        assert_ok!(bridge.handle_offer(offer(), Some(60.0), None).await);
        let rendering = counters.last_source.lock().clone().unwrap();
        tokio::time::timeout(Duration::from_secs(2), async {
            while rendering.frames_published() == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        bridge.cleanup();

        counters.no_frames.store(true, Ordering::SeqCst);
        assert_ok!(bridge.handle_offer(offer(), Some(60.0), None).await);
        let idle = counters.last_source.lock().clone().unwrap();
        while rx.try_recv().is_ok() {}
        // Ground truth still flows without any rendering
        let text = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
        assert!(matches!(parse_message(&text).unwrap(), ChannelMessage::BallPosition(_)));
        assert_eq!(idle.frames_published(), 0);
        bridge.cleanup();
    }

    #[tokio::test]
    async fn failed_negotiation_rolls_back() {
        let (bridge, counters, _hub) = bridge();
        counters.fail_negotiation.store(true, Ordering::SeqCst);

        let err = assert_err!(bridge.handle_offer(offer(), None, None).await);
        assert!(matches!(err, OfferHandlingError::Negotiation(_)));
        assert_eq!(bridge.connection_count(), 0);
        assert_eq!(counters.created.load(Ordering::SeqCst), 1);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_requests_create_nothing() {
        let (bridge, counters, _hub) = bridge();

        let err = assert_err!(bridge.handle_offer(offer(), Some(f64::NAN), None).await);
        assert!(matches!(
            err,
            OfferHandlingError::InvalidConfig(BallConfigError::NonFiniteFrameRate(_))
        ));

        let answer = SessionDescription::answer("v=0".into());
        let err = assert_err!(bridge.handle_offer(answer, None, None).await);
        assert!(matches!(err, OfferHandlingError::MalformedOffer(_)));

        let empty = SessionDescription { sdp_type: SdpType::Offer, sdp: "  ".into() };
        assert_err!(bridge.handle_offer(empty, None, None).await);

        assert_eq!(counters.created.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cleanup_is_idempotent() {
        let (bridge, counters, _hub) = bridge();
        assert_ok!(bridge.handle_offer(offer(), None, None).await);
        assert_ok!(bridge.handle_offer(offer(), None, None).await);

        assert_eq!(bridge.cleanup(), 2);
        assert_eq!(bridge.cleanup(), 0);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn closing_a_client_releases_only_its_connections() {
        let (bridge, counters, _hub) = bridge();
        let client = ClientId::random();
        bridge.handle_offer(offer(), None, Some(client)).await.unwrap();
        bridge.handle_offer(offer(), None, None).await.unwrap();

        assert_eq!(bridge.close_bound_to(&client), 1);
        assert_eq!(bridge.connection_count(), 1);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);

        let remaining = bridge.connection_ids()[0];
        assert!(bridge.close(&remaining));
        assert!(!bridge.close(&remaining));
    }
}
