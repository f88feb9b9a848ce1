//! Module for user profile and management API endpoints.
//!
//! This module handles functionalities related to user information that is
//! not part of core authentication: the profile, storage quota, wallet
//! binding, and referral/KOL accounting. All routes here require a token.

pub mod handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/user/info", get(handlers::user_info))
        .route("/user/storage_size", get(handlers::storage_size))
        .route("/user/vip", get(handlers::vip_info))
        .route("/user/wallet/bind", post(handlers::bind_wallet))
        .route("/user/wallet/unbind", post(handlers::unbind_wallet))
        .route("/user/referral/list", get(handlers::referral_list))
        .route("/user/referral/code", post(handlers::add_referral_code))
        .route("/user/referral/code/detail", get(handlers::referral_code_detail))
        .route("/user/referral/code/stats", get(handlers::referral_code_stats))
}
