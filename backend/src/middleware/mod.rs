//! General-purpose middleware for the API.
//!
//! This module contains the reusable middleware components applied to the
//! whole router: request logging and CORS. Authentication middleware lives
//! with the auth module.

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use tower_http::cors::CorsLayer;

/// Logs every request with its status and latency.
pub async fn request_logger(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();

    let response = next.run(req).await;

    tracing::info!(
        %method,
        %uri,
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "request"
    );
    response
}

/// The portal frontend is served from a different origin.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::permissive()
}
