//! Native media endpoint using str0m
//!
//! str0m is sans-IO: each endpoint owns a UDP socket and, once the offer is
//! accepted, a driver task that shuttles datagrams and timeouts in and out
//! of the `Rtc` instance and writes encoded frames to the negotiated video
//! track.

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use str0m::change::SdpOffer;
use str0m::media::{MediaKind, MediaTime, Mid};
use str0m::net::{Protocol, Receive};
use str0m::{Candidate, Event, IceConnectionState, Input, Output, Rtc};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use ball_tracker_core::core::config::WebRtcConfig;
use ball_tracker_core::media::{
    EndpointFactory, FrameEncoder, MediaEndpoint, MediaResult, SessionDescription, VideoFrame,
    VideoSource,
};
use ball_tracker_core::types::MediaError;
use ball_tracker_core::{log_debug, log_info, log_warn, ConnectionId};

use crate::constants::UDP_RECV_BUFFER;

/// Builds a fresh encoder for each endpoint
pub type EncoderFactory = Arc<dyn Fn() -> Box<dyn FrameEncoder> + Send + Sync>;

struct Shared {
    connected: AtomicBool,
    closed: AtomicBool,
}

/// Server-side media endpoint using str0m
pub struct Str0mEndpoint {
    /// Connection ID
    id: ConnectionId,
    /// Until negotiation the Rtc lives here; afterwards the driver owns it
    rtc: Option<Rtc>,
    socket: Option<UdpSocket>,
    local_addr: SocketAddr,
    source: Option<VideoSource>,
    encoder: Option<Box<dyn FrameEncoder>>,
    shared: Arc<Shared>,
    driver: Option<JoinHandle<()>>,
}

impl Str0mEndpoint {
    fn new(id: ConnectionId, config: &WebRtcConfig, encoder: Option<Box<dyn FrameEncoder>>) -> MediaResult<Self> {
        let std_socket = std::net::UdpSocket::bind(config.udp_bind_addr)?;
        std_socket.set_nonblocking(true)?;
        let socket = UdpSocket::from_std(std_socket)?;
        let local_addr = socket.local_addr()?;

        let mut rtc = Rtc::builder()
            .set_ice_lite(config.ice_lite)
            .build();

        let advertised = SocketAddr::new(candidate_ip(local_addr.ip(), config.public_ip), local_addr.port());
        let candidate = Candidate::host(advertised, "udp")
            .map_err(|e| MediaError::Engine(format!("Invalid host candidate {}: {:?}", advertised, e)))?;
        rtc.add_local_candidate(candidate);

        log_info!("Created str0m endpoint {} on {} (candidate {})", id, local_addr, advertised);

        Ok(Self {
            id,
            rtc: Some(rtc),
            socket: Some(socket),
            local_addr,
            source: None,
            encoder,
            shared: Arc::new(Shared {
                connected: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
            driver: None,
        })
    }

    /// Address the endpoint's socket is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn start_driver(&mut self) -> MediaResult<()> {
        let rtc = self.rtc.take().ok_or(MediaError::Closed)?;
        let socket = self.socket.take().ok_or(MediaError::Closed)?;
        let driver = Driver {
            id: self.id,
            rtc,
            socket,
            local_addr: self.local_addr,
            source: self.source.clone(),
            encoder: self.encoder.take(),
            shared: self.shared.clone(),
            video_mid: None,
            started: Instant::now(),
        };
        self.driver = Some(tokio::spawn(driver.run()));
        Ok(())
    }
}

/// Unspecified bind addresses cannot be advertised; fall back to the
/// configured public address, then loopback
fn candidate_ip(bound: IpAddr, public_ip: Option<IpAddr>) -> IpAddr {
    match public_ip {
        Some(ip) => ip,
        None if bound.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        None => bound,
    }
}

impl MediaEndpoint for Str0mEndpoint {
    fn add_video_track(&mut self, source: VideoSource) -> MediaResult<()> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(MediaError::Closed);
        }
        if self.rtc.is_none() {
            return Err(MediaError::Engine("Track must be added before negotiation".to_string()));
        }
        self.source = Some(source);
        Ok(())
    }

    fn accept_offer(
        &mut self,
        offer: SessionDescription,
    ) -> Pin<Box<dyn Future<Output = MediaResult<SessionDescription>> + Send + '_>> {
        Box::pin(async move {
            let rtc = self.rtc.as_mut().ok_or(MediaError::Closed)?;

            let offer = SdpOffer::from_sdp_string(&offer.sdp)
                .map_err(|e| MediaError::InvalidSdp(format!("Invalid SDP offer: {:?}", e)))?;
            let answer = rtc
                .sdp_api()
                .accept_offer(offer)
                .map_err(|e| MediaError::Engine(format!("Failed to create answer: {:?}", e)))?;

            let answer = SessionDescription::answer(answer.to_sdp_string());
            self.start_driver()?;
            Ok(answer)
        })
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// Frames are only read when there is an encoder to put them on the wire
    fn wants_frames(&self) -> bool {
        self.encoder.is_some()
    }

    fn close(&mut self) -> MediaResult<()> {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.shared.connected.store(false, Ordering::Release);
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
        if let Some(mut rtc) = self.rtc.take() {
            rtc.disconnect();
        }
        self.socket = None;
        log_debug!("Closed str0m endpoint {}", self.id);
        Ok(())
    }
}

impl Drop for Str0mEndpoint {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

struct Driver {
    id: ConnectionId,
    rtc: Rtc,
    socket: UdpSocket,
    local_addr: SocketAddr,
    source: Option<VideoSource>,
    encoder: Option<Box<dyn FrameEncoder>>,
    shared: Arc<Shared>,
    video_mid: Option<Mid>,
    started: Instant,
}

impl Driver {
    async fn run(mut self) {
        let mut buf = vec![0u8; UDP_RECV_BUFFER];
        loop {
            let Some(deadline) = self.poll_until_timeout().await else {
                break;
            };
            if !self.rtc.is_alive() {
                break;
            }

            let wait = deadline.saturating_duration_since(Instant::now());
            let can_write = self.encoder.is_some() && self.video_mid.is_some();
            let source = self.source.clone();

            tokio::select! {
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok((n, source_addr)) => self.receive(&buf[..n], source_addr),
                    Err(e) => {
                        log_warn!("Endpoint {} socket error: {}", self.id, e);
                        break;
                    }
                },
                frame = next_frame(source), if can_write => match frame {
                    Some(frame) => self.write_frame(&frame),
                    None => break,
                },
                _ = tokio::time::sleep(wait) => {
                    if let Err(e) = self.rtc.handle_input(Input::Timeout(Instant::now())) {
                        log_warn!("Endpoint {} timeout handling failed: {:?}", self.id, e);
                        break;
                    }
                }
            }
        }

        self.rtc.disconnect();
        self.shared.connected.store(false, Ordering::Release);
        log_debug!("Endpoint {} driver stopped", self.id);
    }

    /// Drain str0m output until it asks to be woken at a deadline
    async fn poll_until_timeout(&mut self) -> Option<Instant> {
        loop {
            match self.rtc.poll_output() {
                Ok(Output::Timeout(deadline)) => return Some(deadline),
                Ok(Output::Transmit(transmit)) => {
                    if let Err(e) = self.socket.send_to(&transmit.contents, transmit.destination).await {
                        log_debug!("Endpoint {} send to {} failed: {}", self.id, transmit.destination, e);
                    }
                }
                Ok(Output::Event(event)) => self.handle_event(event),
                Err(e) => {
                    log_warn!("Endpoint {} poll error: {:?}", self.id, e);
                    return None;
                }
            }
        }
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Connected => {
                log_info!("Endpoint {} connected", self.id);
                self.shared.connected.store(true, Ordering::Release);
            }
            Event::IceConnectionStateChange(state) => {
                log_debug!("Endpoint {} ICE state: {:?}", self.id, state);
                if matches!(state, IceConnectionState::Disconnected) {
                    self.shared.connected.store(false, Ordering::Release);
                }
            }
            Event::MediaAdded(added) => {
                if added.kind == MediaKind::Video {
                    log_debug!("Endpoint {} video track on mid {:?}", self.id, added.mid);
                    self.video_mid = Some(added.mid);
                }
            }
            _ => {}
        }
    }

    fn receive(&mut self, datagram: &[u8], source: SocketAddr) {
        let receive: Result<Receive<'_>, _> = datagram.try_into().map(|contents| Receive {
            proto: Protocol::Udp,
            source,
            destination: self.local_addr,
            contents,
        });
        match receive {
            Ok(receive) => {
                if let Err(e) = self.rtc.handle_input(Input::Receive(Instant::now(), receive)) {
                    log_debug!("Endpoint {} rejected datagram from {}: {:?}", self.id, source, e);
                }
            }
            Err(e) => log_debug!("Endpoint {} unparseable datagram from {}: {:?}", self.id, source, e),
        }
    }

    fn write_frame(&mut self, frame: &VideoFrame) {
        let (Some(encoder), Some(mid)) = (self.encoder.as_mut(), self.video_mid) else {
            return;
        };
        let data = match encoder.encode(frame) {
            Ok(data) => data,
            Err(e) => {
                log_warn!("Endpoint {} failed to encode frame: {}", self.id, e);
                return;
            }
        };
        let Some(writer) = self.rtc.writer(mid) else {
            return;
        };

        let codec = encoder.codec_name();
        let pt = writer
            .payload_params()
            .find(|params| format!("{:?}", params.spec().codec).eq_ignore_ascii_case(codec))
            .map(|params| params.pt());
        let Some(pt) = pt else {
            log_warn!("Endpoint {}: {} was not negotiated", self.id, codec);
            return;
        };

        let now = Instant::now();
        // 90kHz video clock
        let ticks = now.duration_since(self.started).as_micros() * 9 / 100;
        if let Err(e) = writer.write(pt, now, MediaTime::from_90khz(ticks as _), data) {
            log_warn!("Endpoint {} failed to write frame: {:?}", self.id, e);
        }
    }
}

async fn next_frame(source: Option<VideoSource>) -> Option<VideoFrame> {
    match source {
        Some(source) => source.next_frame().await,
        None => std::future::pending().await,
    }
}

/// Creates str0m endpoints bound per the `[webrtc]` config
pub struct Str0mEndpointFactory {
    config: WebRtcConfig,
    encoder: Option<EncoderFactory>,
}

impl Str0mEndpointFactory {
    /// Factory without an encoder: sessions negotiate but carry no media
    pub fn new(config: WebRtcConfig) -> Self {
        Self { config, encoder: None }
    }

    /// Give every new endpoint an encoder from `encoder`
    pub fn with_encoder(mut self, encoder: EncoderFactory) -> Self {
        self.encoder = Some(encoder);
        self
    }
}

impl EndpointFactory for Str0mEndpointFactory {
    type Endpoint = Str0mEndpoint;

    fn create(&self, id: ConnectionId) -> MediaResult<Str0mEndpoint> {
        let encoder = self.encoder.as_ref().map(|make| make());
        Str0mEndpoint::new(id, &self.config, encoder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ball_tracker_core::media::SdpType;

    fn loopback_config() -> WebRtcConfig {
        WebRtcConfig { udp_bind_addr: "127.0.0.1:0".parse().unwrap(), ..WebRtcConfig::default() }
    }

    #[test]
    fn candidate_prefers_public_ip_then_bound_address() {
        let public: IpAddr = "203.0.113.7".parse().unwrap();
        let unspecified = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
        let bound: IpAddr = "10.0.0.2".parse().unwrap();

        assert_eq!(candidate_ip(unspecified, Some(public)), public);
        assert_eq!(candidate_ip(unspecified, None), IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(candidate_ip(bound, None), bound);
    }

    #[tokio::test]
    async fn garbage_offer_is_invalid_sdp() {
        let factory = Str0mEndpointFactory::new(loopback_config());
        let mut endpoint = factory.create(ConnectionId::random()).unwrap();
        assert_ne!(endpoint.local_addr().port(), 0);

        let offer = SessionDescription { sdp_type: SdpType::Offer, sdp: "not sdp".into() };
        let err = endpoint.accept_offer(offer).await.unwrap_err();
        assert!(matches!(err, MediaError::InvalidSdp(_)));
        assert!(!endpoint.is_connected());
    }

    #[tokio::test]
    async fn close_is_idempotent_and_blocks_new_tracks() {
        let factory = Str0mEndpointFactory::new(loopback_config());
        let mut endpoint = factory.create(ConnectionId::random()).unwrap();
        assert!(!endpoint.wants_frames());
        endpoint.close().unwrap();
        endpoint.close().unwrap();
        assert!(matches!(endpoint.add_video_track(VideoSource::new()), Err(MediaError::Closed)));
    }
}
