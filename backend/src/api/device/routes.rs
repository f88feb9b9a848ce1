//! Defines the HTTP routes for device binding and observability.
//!
//! Binding is called by the device itself with a signed binding code, so it
//! sits outside the token wall; everything else requires the owner's token.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use super::handlers;
use crate::state::AppState;

pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new().route("/device/bind", post(handlers::bind_device))
}

pub fn authed_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/device/binding_code", post(handlers::binding_code))
        .route("/device/unbind", post(handlers::unbind_device))
        .route("/device/rename", post(handlers::rename_device))
        .route("/device/replicas", get(handlers::replica_events))
        .route("/device/validations", get(handlers::validation_results))
        .route("/device/profits", get(handlers::profit_details))
}
