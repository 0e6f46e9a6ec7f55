//! Coordinate channel wire protocol
//!
//! Every message is a JSON object `{"type": ..., "payload": ...}`. The
//! envelope is decoded once, here, into a closed set of variants; nothing
//! past this boundary inspects raw JSON.

use serde::{Deserialize, Serialize};

use crate::media::{SdpType, SessionDescription};
use crate::types::{ErrorMetric, MalformedMessageError, Position};

/// Messages exchanged over the coordinate channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ChannelMessage {
    /// Client media offer with the requested stream settings
    #[serde(rename = "webrtc-offer")]
    WebRtcOffer(OfferPayload),

    /// Server answer to an offer
    #[serde(rename = "webrtc-answer")]
    WebRtcAnswer(SessionDescription),

    /// Client position estimate
    #[serde(rename = "coordinates")]
    Coordinates(Position),

    /// Tracking error metric, or a failure report
    #[serde(rename = "error")]
    Error(ErrorPayload),

    /// Ground-truth position from a simulator
    #[serde(rename = "ballPosition")]
    BallPosition(Position),
}

/// Payload of a `webrtc-offer` message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferPayload {
    /// SDP content
    pub sdp: String,
    /// Declared SDP type; anything but `offer` is rejected by the bridge
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    /// Requested stream settings
    #[serde(default)]
    pub config: OfferConfig,
}

impl OfferPayload {
    /// The session description part of the offer
    pub fn description(&self) -> SessionDescription {
        SessionDescription { sdp_type: self.sdp_type, sdp: self.sdp.clone() }
    }
}

/// Stream settings requested alongside an offer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OfferConfig {
    /// Requested frames per second
    #[serde(rename = "frameRate", default, skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<f64>,
}

/// Payload of an `error` message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorPayload {
    /// A computed tracking error
    Metric(ErrorMetric),
    /// A human-readable failure, e.g. a rejected offer
    Failure(String),
}

impl ChannelMessage {
    /// A tracking error metric message
    pub fn metric(metric: ErrorMetric) -> Self {
        ChannelMessage::Error(ErrorPayload::Metric(metric))
    }

    /// A failure report message
    pub fn failure(message: impl Into<String>) -> Self {
        ChannelMessage::Error(ErrorPayload::Failure(message.into()))
    }

    /// Wire name of the message type
    pub fn kind(&self) -> &'static str {
        match self {
            ChannelMessage::WebRtcOffer(_) => "webrtc-offer",
            ChannelMessage::WebRtcAnswer(_) => "webrtc-answer",
            ChannelMessage::Coordinates(_) => "coordinates",
            ChannelMessage::Error(_) => "error",
            ChannelMessage::BallPosition(_) => "ballPosition",
        }
    }

    /// Encode as a JSON text frame
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Decode and validate one text frame. Positions must pass
/// [`Position::validate`].
pub fn parse_message(text: &str) -> Result<ChannelMessage, MalformedMessageError> {
    let message: ChannelMessage = serde_json::from_str(text)?;
    if let ChannelMessage::Coordinates(position) | ChannelMessage::BallPosition(position) = &message {
        position.validate()?;
    }
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_offer_with_config() {
        let text = r#"{"type":"webrtc-offer","payload":{"sdp":"v=0","type":"offer","config":{"frameRate":24}}}"#;
        let ChannelMessage::WebRtcOffer(offer) = parse_message(text).unwrap() else {
            panic!("expected offer");
        };
        assert_eq!(offer.sdp_type, SdpType::Offer);
        assert_eq!(offer.config.frame_rate, Some(24.0));
    }

    #[test]
    fn offer_config_is_optional() {
        let text = r#"{"type":"webrtc-offer","payload":{"sdp":"v=0","type":"offer"}}"#;
        let ChannelMessage::WebRtcOffer(offer) = parse_message(text).unwrap() else {
            panic!("expected offer");
        };
        assert_eq!(offer.config, OfferConfig::default());
    }

    #[test]
    fn encodes_metric_envelope() {
        let message = ChannelMessage::metric(ErrorMetric { error: 2.24, timestamp: 5 });
        let value: serde_json::Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "error", "payload": {"error": 2.24, "timestamp": 5}}));
    }

    #[test]
    fn error_payload_accepts_failure_string() {
        let text = r#"{"type":"error","payload":"Failed to process WebRTC offer"}"#;
        assert_eq!(
            parse_message(text).unwrap(),
            ChannelMessage::failure("Failed to process WebRTC offer")
        );
    }

    #[test]
    fn ball_position_uses_camel_case_tag() {
        let message = ChannelMessage::BallPosition(Position::new(1.0, 2.0, 3));
        let value: serde_json::Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "ballPosition");
        assert_eq!(message.kind(), "ballPosition");
    }

    #[test]
    fn rejects_malformed_payloads() {
        for text in [
            "not json",
            r#"{"type":"coordinates","payload":{"x":1}}"#,
            r#"{"type":"coordinates","payload":{"x":"a","y":1,"timestamp":1}}"#,
            r#"{"type":"teleport","payload":{}}"#,
            r#"{"payload":{"x":1,"y":1,"timestamp":1}}"#,
            r#"{"type":"webrtc-offer","payload":{"sdp":"v=0","type":"rollback"}}"#,
        ] {
            assert!(parse_message(text).is_err(), "accepted {text}");
        }
    }

    #[test]
    fn rejects_unusable_positions() {
        for text in [
            r#"{"type":"coordinates","payload":{"x":1,"y":1,"timestamp":-9223372036854775808}}"#,
            r#"{"type":"coordinates","payload":{"x":1,"y":1,"timestamp":9223372036854775807}}"#,
            r#"{"type":"coordinates","payload":{"x":1e200,"y":0,"timestamp":1000}}"#,
            r#"{"type":"ballPosition","payload":{"x":0,"y":-1e7,"timestamp":1000}}"#,
        ] {
            assert!(
                matches!(parse_message(text), Err(MalformedMessageError::Position(_))),
                "accepted {text}"
            );
        }
        assert!(parse_message(r#"{"type":"coordinates","payload":{"x":-3.5,"y":700,"timestamp":0}}"#).is_ok());
    }
}
