//! HTTP request handlers for the ball tracker API

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request, State},
    http::StatusCode,
    response::Json,
    Json as JsonExtractor,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use ball_tracker_core::media::EndpointFactory;
use ball_tracker_core::{log_error, log_warn, Position};

use crate::core::AppState;

/// Acknowledgement for accepted submissions
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    /// Always true
    pub success: bool,
}

/// Error response for rejected requests
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Whether the operation was successful (always false)
    pub success: bool,
    /// Error message
    pub error: String,
    /// Optional details about what was invalid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorResponse {
    /// Create a bad request error response
    pub fn bad_request(error: String) -> Self {
        Self { success: false, error, details: None }
    }

    /// Create an internal error response with details
    pub fn internal(error: String, details: Value) -> Self {
        Self { success: false, error, details: Some(details) }
    }
}

/// System health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Current system status
    pub status: String,
    /// Seconds since the server state was built
    pub uptime_secs: u64,
    /// Server version
    pub version: String,
    /// Open coordinate channel clients
    pub clients: usize,
    /// Live media connections
    pub media_connections: usize,
}

/// Custom JSON extractor that returns proper JSON error responses
pub struct JsonRequest<T>(pub T);

impl<T, S> FromRequest<S> for JsonRequest<T>
where
    T: serde::de::DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match JsonExtractor::<T>::from_request(req, state).await {
            Ok(JsonExtractor(value)) => Ok(JsonRequest(value)),
            Err(rejection) => {
                let error_message = match rejection {
                    JsonRejection::JsonDataError(err) => {
                        log_warn!("Invalid JSON data: {}", err);
                        "Invalid JSON data".to_string()
                    }
                    JsonRejection::JsonSyntaxError(_) => "Malformed JSON".to_string(),
                    JsonRejection::MissingJsonContentType(_) => {
                        "Missing or invalid Content-Type header. Expected 'application/json'".to_string()
                    }
                    JsonRejection::BytesRejection(_) => "Failed to read request body".to_string(),
                    _ => "Invalid JSON request".to_string(),
                };

                log_warn!("JSON parsing error: {}", error_message);
                Err((StatusCode::BAD_REQUEST, Json(ErrorResponse::bad_request(error_message))))
            }
        }
    }
}

/// Submit a client estimate over HTTP; same effect as a `coordinates`
/// channel message
pub async fn submit_coordinates<F: EndpointFactory + 'static>(
    State(state): State<Arc<AppState<F>>>,
    JsonRequest(position): JsonRequest<Position>,
) -> Result<Json<SubmitResponse>, (StatusCode, Json<ErrorResponse>)> {
    if let Err(e) = position.validate() {
        log_warn!("Rejected coordinates: {}", e);
        return Err((StatusCode::BAD_REQUEST, Json(ErrorResponse::bad_request(e.to_string()))));
    }
    match state.hub.handle_coordinates(position) {
        Ok(_) => Ok(Json(SubmitResponse { success: true })),
        Err(e) => {
            log_error!("Failed to process coordinates: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::internal(
                    "Failed to process coordinates".to_string(),
                    json!({ "reason": e.to_string() }),
                )),
            ))
        }
    }
}

/// Health check endpoint
pub async fn health_check<F: EndpointFactory + 'static>(State(state): State<Arc<AppState<F>>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        clients: state.hub.client_count(),
        media_connections: state.bridge.connection_count(),
    })
}

/// Root API endpoint
pub async fn root_handler<F: EndpointFactory + 'static>(State(state): State<Arc<AppState<F>>>) -> Json<Value> {
    Json(json!({
        "service": "Ball Tracker",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "operational",
        "endpoints": {
            "channel": state.config.server.ws_path,
            "coordinates": "/api/coordinates",
            "health": "/health"
        }
    }))
}
