//! Central module for organizing the application's main API endpoints.
//!
//! This module acts as a top-level container for the user, device and asset
//! API domains, assembles the versioned router, and carries the handful of
//! endpoints that belong to no domain (health, monitor, link redirect).

pub mod asset;
pub mod device;
pub mod user;

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::Redirect;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::auth;
use crate::errors::{ApiResult, ErrorCode};
use crate::middleware::request_logger;
use crate::state::AppState;

/// Success envelope; the frontend treats `code == 0` as OK.
pub fn ok<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({ "code": 0, "data": data }))
}

pub fn router(state: Arc<AppState>) -> Router {
    let authed = Router::new()
        .merge(user::routes())
        .merge(device::authed_routes())
        .merge(asset::routes::authed_routes())
        .layer(from_fn_with_state(state.clone(), auth::middleware::require_auth));

    let admin = asset::routes::admin_routes()
        .layer(from_fn(auth::middleware::require_admin))
        .layer(from_fn_with_state(state.clone(), auth::middleware::require_auth));

    let api = Router::new()
        .nest("/auth", auth::routes::routes())
        .merge(device::public_routes())
        .merge(asset::routes::public_routes())
        .route("/monitor", get(monitor))
        .merge(authed)
        .merge(admin);

    Router::new()
        .route("/health", get(health))
        .route("/link", get(open_short_link))
        .nest("/api/v1", api)
        .layer(from_fn(request_logger))
        .layer(crate::middleware::cors_layer())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Node/country overview for the landing dashboard.
async fn monitor(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let online = state.db.online_device_count().await?;
    let countries = state.db.device_country_counts().await?;

    let country_list: Vec<Value> = countries
        .into_iter()
        .map(|(country, count)| json!({ "country": country, "count": count }))
        .collect();

    Ok(ok(json!({
        "online": online,
        "country_count": country_list.len(),
        "countries": country_list,
    })))
}

#[derive(Debug, Deserialize)]
struct ShortLinkQuery {
    #[serde(default)]
    cid: String,
}

/// Resolves a short share link and redirects to the stored long URL.
async fn open_short_link(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ShortLinkQuery>,
) -> ApiResult<Redirect> {
    if query.cid.is_empty() {
        return Err(ErrorCode::InvalidParams.into());
    }
    let long = state
        .db
        .long_link_by_cid(&query.cid)
        .await?
        .ok_or(ErrorCode::NotFound)?;
    Ok(Redirect::permanent(&long))
}

/// `area_id` arrives as a comma-separated list on the query string.
pub(crate) fn parse_area_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn area_id_lists_are_parsed() {
        assert_eq!(
            parse_area_ids("area-1, area-2,,area-3"),
            vec!["area-1", "area-2", "area-3"]
        );
        assert!(parse_area_ids("").is_empty());
    }
}
