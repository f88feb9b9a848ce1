//! Defines the HTTP routes for the asset API.
//!
//! Split into the public share surface (no token), the authenticated storage
//! surface, and the operator-only migration endpoint.

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;

use super::handlers;
use crate::state::AppState;

pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/storage/open_asset", get(handlers::open_asset))
        .route("/storage/asset_status", get(handlers::asset_status))
        .route("/storage/link_info", get(handlers::link_info))
        .route("/storage/need_pass", get(handlers::link_need_pass))
        .route("/storage/check_link", post(handlers::check_link))
        .route("/storage/area_ids", get(handlers::area_ids))
}

pub fn authed_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/storage/upload_info", get(handlers::upload_info))
        .route("/storage/create_asset", post(handlers::create_asset))
        .route("/storage/delete_asset", delete(handlers::delete_asset))
        .route("/storage/share_asset", get(handlers::share_asset))
        .route("/storage/share_status", post(handlers::share_status))
        .route("/storage/asset_list", get(handlers::asset_list))
        .route("/storage/asset_detail", get(handlers::asset_detail))
        .route("/storage/asset_count", get(handlers::asset_count))
        .route("/storage/create_link", post(handlers::create_link))
        .route("/storage/update_link", post(handlers::update_link))
        .route("/storage/group", post(handlers::create_group))
        .route("/storage/groups", get(handlers::list_groups))
        .route("/storage/group", delete(handlers::delete_group))
        .route("/storage/group/rename", post(handlers::rename))
        .route("/storage/group/move", post(handlers::move_group))
        .route("/storage/move_asset", post(handlers::move_asset))
}

pub fn admin_routes() -> Router<Arc<AppState>> {
    Router::new().route("/admin/move_node", post(handlers::move_node))
}
