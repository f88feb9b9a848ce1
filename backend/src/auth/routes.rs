//! Defines the HTTP routes specifically for authentication.
//!
//! These routes handle registration, login, password reset and the nonce /
//! verify-code endpoints. They are mounted under `/api/v1/auth` by the main
//! router and are the only API surface reachable without a token.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use super::handlers;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/reset_password", post(handlers::reset_password))
        .route("/verify_code", post(handlers::send_verify_code))
        .route("/nonce", get(handlers::signature_nonce))
}
