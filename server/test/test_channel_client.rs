//! Coordinate channel client that tracks the ball end to end
//!
//! Opens the channel, requests a media session, rebuilds frames from the
//! `ballPosition` samples it receives, estimates the ball at half the frame
//! rate and reports its estimates. Error metrics from the server are
//! printed as they arrive.

use clap::{Arg, ArgAction, Command};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use ball_tracker_core::comms::{ChannelMessage, ChannelState, CoordinateChannel, ErrorPayload, OfferConfig, OfferPayload};
use ball_tracker_core::core::config;
use ball_tracker_core::estimator::EstimationGuard;
use ball_tracker_core::media::{render_ball_frame, SdpType};
use ball_tracker_core::types::now_millis;
use ball_tracker_core::{log_info, log_warn, BallConfig, ColorThresholdEstimator, Point, Position};

/// Minimal receive-only video offer. The server only needs a parseable
/// session to start its simulator.
const RECVONLY_VIDEO_OFFER: &str = "v=0\r\n\
o=- 4611731400430051336 2 IN IP4 127.0.0.1\r\n\
s=-\r\n\
t=0 0\r\n\
a=group:BUNDLE 0\r\n\
a=msid-semantic: WMS\r\n\
m=video 9 UDP/TLS/RTP/SAVPF 96\r\n\
c=IN IP4 0.0.0.0\r\n\
a=rtcp:9 IN IP4 0.0.0.0\r\n\
a=ice-ufrag:b4Lx\r\n\
a=ice-pwd:Ys2tWkqRmIIR0ADXJ6aTqKNU\r\n\
a=ice-options:trickle\r\n\
a=fingerprint:sha-256 8A:1C:55:0B:6E:2F:93:D4:47:AE:10:C8:3B:F1:69:02:5D:E7:84:3A:B9:0C:7F:26:D1:48:95:E3:1A:6C:B0:4F\r\n\
a=setup:actpass\r\n\
a=mid:0\r\n\
a=recvonly\r\n\
a=rtcp-mux\r\n\
a=rtcp-rsize\r\n\
a=rtpmap:96 VP8/90000\r\n\
a=rtcp-fb:96 nack\r\n\
a=rtcp-fb:96 nack pli\r\n";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = Command::new("test_channel_client")
        .about("Tracks the simulated ball over the coordinate channel")
        .arg(Arg::new("config").short('c').long("config").value_name("FILE").help("Configuration file path"))
        .arg(Arg::new("url").long("url").value_name("URL").help("Override the channel URL"))
        .arg(
            Arg::new("frame-rate")
                .long("frame-rate")
                .value_name("FPS")
                .value_parser(clap::value_parser!(f64))
                .help("Frame rate to request"),
        )
        .arg(
            Arg::new("seconds")
                .long("seconds")
                .value_name("N")
                .value_parser(clap::value_parser!(u64))
                .help("Stop after N seconds"),
        )
        .arg(Arg::new("no-offer").long("no-offer").action(ArgAction::SetTrue).help("Only listen, do not request media"))
        .get_matches();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = matches.get_one::<String>("config").map(|s| s.as_str());
    let mut config = config::load_config_or_default(config_path);
    if let Some(url) = matches.get_one::<String>("url") {
        config.client.url = url.clone();
    }
    let frame_rate = matches.get_one::<f64>("frame-rate").copied();
    let ball = config.tracking.ball_config(frame_rate)?;

    let mut channel = CoordinateChannel::connect(&config.client).await?;

    let latest: Arc<Mutex<Option<Position>>> = Arc::new(Mutex::new(None));
    let latest_in = latest.clone();
    channel.on_message(move |message| match message {
        ChannelMessage::BallPosition(position) => *latest_in.lock() = Some(*position),
        ChannelMessage::WebRtcAnswer(_) => log_info!("Media session answered"),
        ChannelMessage::Error(ErrorPayload::Metric(metric)) => {
            println!("Tracking error: {:.2}px at {}", metric.error, metric.timestamp);
        }
        ChannelMessage::Error(ErrorPayload::Failure(reason)) => log_warn!("Server reported: {}", reason),
        _ => {}
    });

    if !matches.get_flag("no-offer") {
        let offer = ChannelMessage::WebRtcOffer(OfferPayload {
            sdp: RECVONLY_VIDEO_OFFER.to_string(),
            sdp_type: SdpType::Offer,
            config: OfferConfig { frame_rate: Some(ball.frame_rate()) },
        });
        channel.send(&offer);
    }

    let deadline = async {
        match matches.get_one::<u64>("seconds") {
            Some(secs) => tokio::time::sleep(Duration::from_secs(*secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    // Estimate at half the frame rate
    let mut ticker = tokio::time::interval(ball.tick_interval() * 2);
    let guard = Arc::new(EstimationGuard::new(ColorThresholdEstimator::default()));
    let (estimate_tx, mut estimates) = mpsc::unbounded_channel::<Point>();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = &mut deadline => break,
            _ = ticker.tick() => {
                if channel.state().is_terminal() {
                    log_warn!("Channel stopped: {:?}", channel.state());
                    break;
                }
                let Some(position) = *latest.lock() else {
                    continue;
                };
                spawn_estimate(guard.clone(), ball, position, estimate_tx.clone());
            }
            Some(point) = estimates.recv() => {
                channel.send(&ChannelMessage::Coordinates(point.at(now_millis())));
            }
        }
    }

    if let ChannelState::Failed(e) = channel.state() {
        channel.close().await;
        return Err(e.into());
    }
    channel.close().await;
    log_info!("Client finished");
    Ok(())
}

/// Render and estimate off the async runtime; skipped when the previous
/// estimate is still running
fn spawn_estimate(
    guard: Arc<EstimationGuard<ColorThresholdEstimator>>,
    ball: BallConfig,
    position: Position,
    results: mpsc::UnboundedSender<Point>,
) {
    tokio::task::spawn_blocking(move || {
        let frame = render_ball_frame(&ball, &position);
        match guard.try_estimate(&frame) {
            Some(Ok(point)) => {
                let _ = results.send(point);
            }
            Some(Err(e)) => log_warn!("Estimation failed: {}", e),
            None => log_warn!("Previous estimate still running, skipping frame"),
        }
    });
}
