//! Coordinate channel WebSocket endpoint
//!
//! One reader loop per socket plus a writer task draining the client's hub
//! queue. Invalid messages are logged and dropped without closing the socket.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;

use ball_tracker_core::comms::{parse_message, ChannelMessage, OfferPayload};
use ball_tracker_core::media::EndpointFactory;
use ball_tracker_core::{log_debug, log_error, log_warn, ClientId};

use crate::constants::OFFER_FAILURE_MESSAGE;
use crate::core::AppState;

/// Upgrade to a coordinate channel socket
pub async fn ws_handler<F: EndpointFactory + 'static>(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState<F>>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket<F: EndpointFactory + 'static>(socket: WebSocket, state: Arc<AppState<F>>) {
    let (client, mut outbound) = state.hub.join();
    let (mut sender, mut receiver) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(text) = outbound.recv().await {
            if sender.send(Message::Text(text.into())).await.is_err() {
                return;
            }
        }
        // Hub dropped this client; say goodbye
        let _ = sender.send(Message::Close(None)).await;
    });

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => handle_text(&state, client, text.as_str()).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                log_warn!("Client {} socket error: {}", client, e);
                break;
            }
        }
    }

    state.hub.leave(&client);
    state.bridge.close_bound_to(&client);
    writer.abort();
}

async fn handle_text<F: EndpointFactory + 'static>(state: &AppState<F>, client: ClientId, text: &str) {
    let message = match parse_message(text) {
        Ok(message) => message,
        Err(e) => {
            log_warn!("Dropping message from client {}: {}", client, e);
            return;
        }
    };

    match message {
        ChannelMessage::WebRtcOffer(offer) => {
            let reply = answer_offer(state, client, offer).await;
            if let Err(e) = state.hub.send_to(&client, &reply) {
                log_error!("Failed to encode reply for client {}: {}", client, e);
            }
        }
        ChannelMessage::Coordinates(position) => {
            if let Err(e) = state.hub.handle_coordinates(position) {
                log_error!("Failed to broadcast metric: {}", e);
            }
        }
        other => log_debug!("Ignoring {} message from client {}", other.kind(), client),
    }
}

async fn answer_offer<F: EndpointFactory + 'static>(
    state: &AppState<F>,
    client: ClientId,
    offer: OfferPayload,
) -> ChannelMessage {
    let frame_rate = offer.config.frame_rate;
    match state.bridge.handle_offer(offer.description(), frame_rate, Some(client)).await {
        Ok(answer) => ChannelMessage::WebRtcAnswer(answer),
        Err(e) => {
            log_error!("Failed to handle offer from client {}: {}", client, e);
            ChannelMessage::failure(OFFER_FAILURE_MESSAGE)
        }
    }
}
