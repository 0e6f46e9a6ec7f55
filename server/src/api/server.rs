//! HTTP server implementation for the ball tracker API

use axum::{
    http::{header::CONTENT_TYPE, Method},
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use ball_tracker_core::log_info;
use ball_tracker_core::media::EndpointFactory;

use super::handlers;
use crate::channel::ws_handler;
use crate::core::AppState;

/// Creates the main application router with all routes and middleware
pub fn create_app<F: EndpointFactory + 'static>(app_state: Arc<AppState<F>>) -> Router {
    // CORS configuration - permissive, the channel is consumed from browsers
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .allow_origin(Any);

    let ws_path = route_path(&app_state.config.server.ws_path);

    Router::new()
        .route("/", get(handlers::root_handler::<F>))
        // Coordinate channel
        .route(&ws_path, get(ws_handler::<F>))
        // Estimate submission over plain HTTP
        .route("/api/coordinates", post(handlers::submit_coordinates::<F>))
        // System routes
        .route("/health", get(handlers::health_check::<F>))
        // Apply middleware to ALL routes
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(app_state)
}

fn route_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// Bind the configured HTTP address
pub async fn bind<F: EndpointFactory>(app_state: &AppState<F>) -> std::io::Result<TcpListener> {
    let addr = app_state.config.server.http_addr;
    log_info!("Starting ball tracker API server on {}", addr);
    TcpListener::bind(addr).await
}

/// Serve on `listener` until `shutdown` resolves
pub async fn serve<F: EndpointFactory + 'static>(
    listener: TcpListener,
    app_state: Arc<AppState<F>>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    let ws_path = route_path(&app_state.config.server.ws_path);
    let app = create_app(app_state);

    log_info!("Server listening on http://{}", addr);
    log_info!("Coordinate channel available at ws://{}{}", addr, ws_path);
    log_info!("Health check available at http://{}/health", addr);

    axum::serve(listener, app).with_graceful_shutdown(shutdown).await
}
