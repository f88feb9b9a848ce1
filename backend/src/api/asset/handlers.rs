//! Handler functions for the asset API.
//!
//! Upload hand-off, create/delete with multi-area fan-out, sharing and share
//! links, folders, and the replica dashboards. Handlers stay thin: parameter
//! parsing and error mapping here, coordination in the scheduler pool,
//! persistence in the query layer.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::{Extension, Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use adapters::models::CreateAssetRequest;

use crate::api::{ok, parse_area_ids};
use crate::auth::models::CurrentUser;
use crate::cache::{download_hour_key, upload_pass_key};
use crate::database::models::{NewAsset, NewLink, Pagination};
use crate::database::now_rfc3339;
use crate::errors::{ApiResult, ErrorCode};
use crate::services::notify::UploadNotification;
use crate::state::AppState;
use crate::utils;

/// Open share links stop resolving for non-VIP owners after this many visits.
const MAX_FREE_SHARE_VISITS: i64 = 10;

const UPLOAD_PASS_TTL: Duration = Duration::from_secs(24 * 3600);
const DOWNLOAD_COUNTER_TTL: Duration = Duration::from_secs(48 * 3600);

// ---------------------------------------------------------------------------
// upload

#[derive(Debug, Deserialize)]
pub struct UploadInfoQuery {
    #[serde(default)]
    pub area_id: String,
    #[serde(default)]
    pub encrypted: bool,
    #[serde(default)]
    pub url_mode: bool,
}

pub async fn upload_info(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<UploadInfoQuery>,
) -> ApiResult<Json<Value>> {
    let areas = state
        .schedulers
        .filter_known(&parse_area_ids(&query.area_id))
        .await?;
    let area = areas.first().ok_or(ErrorCode::InvalidParams)?;

    let scheduler = state.schedulers.resolve(area).await?;

    // Encrypted uploads get a pass nonce the client encrypts against; it is
    // redeemed by the matching create_asset call.
    let mut pass_nonce = String::new();
    if query.encrypted {
        pass_nonce = utils::random_code(32);
        state
            .cache
            .set_ex(&upload_pass_key(&current.username), &pass_nonce, UPLOAD_PASS_TTL)
            .await?;
    }

    let info = scheduler
        .node_upload_info(&current.username, &pass_nonce, query.url_mode)
        .await?;

    Ok(ok(json!({
        "already_exists": info.already_exists,
        "list": info.endpoints,
        "area_id": area,
    })))
}

#[derive(Debug, Deserialize)]
pub struct CreateAssetBody {
    pub asset_name: String,
    pub asset_cid: String,
    #[serde(default)]
    pub node_id: String,
    #[serde(default)]
    pub asset_type: String,
    pub asset_size: i64,
    #[serde(default)]
    pub group_id: i64,
    #[serde(default)]
    pub area_id: Vec<String>,
    #[serde(default)]
    pub encrypted: bool,
    /// Tenant integration fields; when set, a signed callback is queued.
    #[serde(default)]
    pub extra_id: String,
    #[serde(default)]
    pub notify_url: String,
}

pub async fn create_asset(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<CreateAssetBody>,
) -> ApiResult<Json<Value>> {
    if req.asset_name.is_empty() || req.asset_cid.is_empty() || req.asset_size <= 0 {
        return Err(ErrorCode::InvalidParams.into());
    }

    let areas = state.schedulers.filter_known(&req.area_id).await?;
    if areas.is_empty() {
        return Err(ErrorCode::InvalidParams.into());
    }

    let user = state
        .db
        .user_by_username(&current.username)
        .await?
        .ok_or(ErrorCode::UserNotFound)?;

    let mut password = String::new();
    if req.encrypted {
        let key = upload_pass_key(&current.username);
        password = state
            .cache
            .get(&key)
            .await?
            .ok_or(ErrorCode::InternalServer)?;
    }

    let hash = utils::cid_storage_key(&req.asset_cid);
    let missing_areas = state
        .db
        .areas_missing_asset(&hash, &current.username, &areas)
        .await?;
    if missing_areas.is_empty() {
        return Err(ErrorCode::FileExists.into());
    }

    if user.total_storage_size - user.used_storage_size < req.asset_size {
        return Err(ErrorCode::StorageQuotaExceeded.into());
    }

    let scheduler = state.schedulers.resolve(&areas[0]).await?;
    let outcome = scheduler
        .create_asset(&CreateAssetRequest {
            user_id: current.username.clone(),
            asset_cid: req.asset_cid.clone(),
            asset_size: req.asset_size,
            node_id: req.node_id.clone(),
        })
        .await?;

    if !outcome.already_exists && outcome.endpoints.is_empty() {
        tracing::error!(cid = %req.asset_cid, "scheduler returned no upload endpoints");
        return Err(ErrorCode::InternalServer.into());
    }

    state
        .db
        .add_asset(
            &NewAsset {
                user_id: current.username.clone(),
                hash: hash.clone(),
                cid: req.asset_cid.clone(),
                asset_name: req.asset_name.clone(),
                asset_type: req.asset_type.clone(),
                total_size: req.asset_size,
                password,
                group_id: req.group_id,
            },
            &missing_areas,
        )
        .await?;

    if req.encrypted {
        state.cache.del(&upload_pass_key(&current.username)).await?;
    }

    if !req.notify_url.is_empty() {
        if let Some(notify) = &state.notify {
            notify.enqueue(UploadNotification {
                extra_id: req.extra_id.clone(),
                user_id: current.username.clone(),
                asset_name: req.asset_name.clone(),
                asset_cid: req.asset_cid.clone(),
                asset_type: req.asset_type.clone(),
                asset_size: req.asset_size,
                group_id: req.group_id,
                created_at: now_rfc3339(),
                notify_url: req.notify_url.clone(),
            });
        }
    }

    let endpoints: Vec<Value> = if outcome.already_exists {
        Vec::new()
    } else {
        outcome
            .endpoints
            .iter()
            .map(|e| json!({ "candidate_addr": e.upload_url, "token": e.token }))
            .collect()
    };

    Ok(ok(json!({
        "already_exists": outcome.already_exists,
        "list": endpoints,
    })))
}

// ---------------------------------------------------------------------------
// delete

#[derive(Debug, Deserialize)]
pub struct DeleteAssetQuery {
    pub asset_cid: String,
    #[serde(default)]
    pub area_id: String,
}

/// Deletes an asset from the requested areas (every held area when none are
/// named), fanning the scheduler calls out concurrently and applying the
/// database bookkeeping only for the areas that confirmed.
pub async fn delete_asset(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<DeleteAssetQuery>,
) -> ApiResult<Json<Value>> {
    let hash = utils::cid_storage_key(&query.asset_cid);

    let held = state.db.areas_holding(&hash, &current.username).await?;
    if held.is_empty() {
        return Err(ErrorCode::NotFound.into());
    }

    let requested = parse_area_ids(&query.area_id);
    let targets: Vec<String> = if requested.is_empty() {
        held.clone()
    } else {
        requested.into_iter().filter(|a| held.contains(a)).collect()
    };
    if targets.is_empty() {
        return Err(ErrorCode::NotFound.into());
    }

    // Dropping the asset row is only correct when every held area goes.
    let drops_record = targets.len() == held.len();

    let outcome = state
        .schedulers
        .clone()
        .remove_asset_fanout(&state.db, &query.asset_cid, &hash, &targets)
        .await;

    if outcome.succeeded.is_empty() {
        return Err(ErrorCode::InternalServer.into());
    }

    let partial = outcome.is_partial();
    state
        .db
        .remove_asset(
            &hash,
            &current.username,
            &outcome.succeeded,
            drops_record && !partial,
        )
        .await?;

    let msg = if partial {
        "partially deleted"
    } else {
        "delete success"
    };
    Ok(ok(json!({ "msg": msg, "areas": outcome.succeeded })))
}

// ---------------------------------------------------------------------------
// share

#[derive(Debug, Deserialize)]
pub struct ShareAssetQuery {
    pub asset_cid: String,
    #[serde(default)]
    pub area_id: String,
}

pub async fn share_asset(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<ShareAssetQuery>,
) -> ApiResult<Json<Value>> {
    let urls = share_urls(&state, &current.username, &query.asset_cid, &query.area_id, None).await?;
    Ok(ok(urls))
}

#[derive(Debug, Deserialize)]
pub struct OpenAssetQuery {
    pub asset_cid: String,
    pub user_id: String,
    #[serde(default)]
    pub area_id: String,
}

/// Public share open: same as `share_asset` but on behalf of the link owner,
/// with short-lived URLs and the non-VIP visit cap.
pub async fn open_asset(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Query(query): Query<OpenAssetQuery>,
) -> ApiResult<Json<Value>> {
    if query.user_id.is_empty() {
        return Err(ErrorCode::InvalidParams.into());
    }

    let client = utils::client_ip(&headers, None).unwrap_or_default();
    tracing::debug!(cid = %query.asset_cid, owner = %query.user_id, %client, "share opened");

    let owner = state
        .db
        .user_by_username(&query.user_id)
        .await?
        .ok_or(ErrorCode::UserNotFound)?;

    let hash = utils::cid_storage_key(&query.asset_cid);
    state.db.add_visit_count(&query.user_id, &hash).await?;
    let visits = state.db.visit_count(&query.user_id, &hash).await?;
    if !owner.enable_vip && visits > MAX_FREE_SHARE_VISITS {
        return Err(ErrorCode::VisitLimitReached.into());
    }

    let expires_at = Utc::now() + chrono::Duration::hours(2);
    let urls = share_urls(
        &state,
        &query.user_id,
        &query.asset_cid,
        &query.area_id,
        Some(expires_at),
    )
    .await?;
    Ok(ok(urls))
}

async fn share_urls(
    state: &Arc<AppState>,
    username: &str,
    cid: &str,
    area_query: &str,
    expires_at: Option<chrono::DateTime<Utc>>,
) -> ApiResult<Value> {
    let hash = utils::cid_storage_key(cid);

    let requested = parse_area_ids(area_query);
    let area = if let Some(area) = requested.first() {
        if !state.db.asset_in_area(&hash, username, area).await? {
            return Err(ErrorCode::NotFound.into());
        }
        area.clone()
    } else {
        state
            .db
            .areas_holding(&hash, username)
            .await?
            .into_iter()
            .next()
            .ok_or(ErrorCode::NotFound)?
    };

    let asset = state
        .db
        .asset_by_hash(&hash, username)
        .await?
        .ok_or(ErrorCode::NotFound)?;

    let scheduler = state.schedulers.resolve(&area).await?;

    let mut urls = if asset.password.is_empty() {
        let mut by_cid = scheduler
            .share_assets(username, &[cid.to_string()], expires_at)
            .await?;
        by_cid.remove(cid).unwrap_or_default()
    } else {
        scheduler
            .share_encrypted_asset(username, cid, &asset.password, expires_at)
            .await?
    };

    for url in urls.iter_mut() {
        url.push_str("&filename=");
        url.push_str(&asset.asset_name);
    }

    // Hourly download stat; best effort.
    let hour = Utc::now().format("%Y%m%d%H").to_string();
    if let Err(e) = state
        .cache
        .incr(&download_hour_key(&hash, &hour), DOWNLOAD_COUNTER_TTL)
        .await
    {
        tracing::error!("download counter: {e}");
    }

    Ok(json!({
        "asset_cid": cid,
        "size": asset.total_size,
        "url": urls,
        "redirect": false,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ShareStatusBody {
    pub cid: String,
}

pub async fn share_status(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<ShareStatusBody>,
) -> ApiResult<Json<Value>> {
    let hash = utils::cid_storage_key(&req.cid);
    state.db.mark_shared(&current.username, &hash).await?;
    Ok(ok(json!({ "msg": "success" })))
}

#[derive(Debug, Deserialize)]
pub struct AssetStatusQuery {
    pub username: String,
    pub cid: String,
}

pub async fn asset_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AssetStatusQuery>,
) -> ApiResult<Json<Value>> {
    let hash = utils::cid_storage_key(&query.cid);
    let asset = state.db.asset_by_hash(&hash, &query.username).await?;

    match asset {
        Some(asset) => Ok(ok(json!({
            "exists": true,
            "asset_name": asset.asset_name,
            "size": asset.total_size,
            "visit_count": asset.visit_count,
        }))),
        None => Ok(ok(json!({ "exists": false }))),
    }
}

// ---------------------------------------------------------------------------
// listing and dashboards

#[derive(Debug, Deserialize)]
pub struct AssetListQuery {
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub page_size: i64,
    #[serde(default)]
    pub group_id: i64,
}

pub async fn asset_list(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<AssetListQuery>,
) -> ApiResult<Json<Value>> {
    let page = Pagination {
        page: query.page,
        page_size: query.page_size,
    };
    let (total, assets) = state
        .db
        .list_assets(&current.username, query.group_id, page.limit(), page.offset())
        .await?;

    let mut list = Vec::with_capacity(assets.len());
    for asset in &assets {
        let areas = state.db.areas_holding(&asset.hash, &current.username).await?;
        list.push(json!({
            "asset": asset,
            "area_ids": areas,
            "encrypted": !asset.password.is_empty(),
        }));
    }

    Ok(ok(json!({ "list": list, "total": total })))
}

#[derive(Debug, Deserialize)]
pub struct AssetDetailQuery {
    pub cid: String,
}

/// Replica detail aggregated across every area that holds the hash. Areas
/// whose scheduler is unreachable are skipped, matching the dashboard's
/// best-effort contract.
pub async fn asset_detail(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<AssetDetailQuery>,
) -> ApiResult<Json<Value>> {
    let hash = utils::cid_storage_key(&query.cid);
    let asset = state
        .db
        .asset_by_hash(&hash, &current.username)
        .await?
        .ok_or(ErrorCode::NotFound)?;

    let areas = state.db.areas_with_asset(&hash).await?;

    let mut node_ids = Vec::new();
    for area in &areas {
        let scheduler = match state.schedulers.resolve(area).await {
            Ok(scheduler) => scheduler,
            Err(e) => {
                tracing::error!(area = %area, "resolve scheduler: {e}");
                continue;
            }
        };
        match scheduler.asset_record(&query.cid).await {
            Ok(record) => {
                for replica in record.replicas {
                    if replica.is_succeeded() {
                        node_ids.push(replica.node_id);
                    }
                }
            }
            Err(e) => tracing::error!(area = %area, "asset record: {e}"),
        }
    }

    Ok(ok(json!({
        "cid": query.cid,
        "cid_name": asset.asset_name,
        "replica_count": node_ids.len(),
        "area_count": areas.len(),
        "node_ids": node_ids,
    })))
}

pub async fn asset_count(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    let area_cids = state.db.area_cid_map(&current.username).await?;
    let counts = state.schedulers.clone().count_replicas(area_cids).await;

    Ok(ok(json!({
        "area_count": counts.areas,
        "candidate_count": counts.candidates,
        "edge_count": counts.edges,
    })))
}

#[derive(Debug, Deserialize)]
pub struct AreaIdsQuery {
    #[serde(default)]
    pub cid: String,
    #[serde(default)]
    pub user_id: String,
}

/// Areas available for placement, or the areas holding one asset.
pub async fn area_ids(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AreaIdsQuery>,
) -> ApiResult<Json<Value>> {
    let list = if query.cid.is_empty() {
        state.schedulers.known_areas().await?
    } else {
        let hash = utils::cid_storage_key(query.cid.trim());
        state.db.areas_holding(&hash, query.user_id.trim()).await?
    };
    Ok(ok(json!({ "list": list })))
}

// ---------------------------------------------------------------------------
// share links

#[derive(Debug, Deserialize)]
pub struct CreateLinkBody {
    pub cid: String,
    pub url: String,
    #[serde(default)]
    pub access_pass: String,
    /// Unix seconds; zero means the link never expires.
    #[serde(default)]
    pub expire_at: i64,
}

pub async fn create_link(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<CreateLinkBody>,
) -> ApiResult<Json<Value>> {
    if req.cid.is_empty() || req.url.is_empty() {
        return Err(ErrorCode::InvalidParams.into());
    }

    let hash = utils::cid_storage_key(&req.cid);
    if state
        .db
        .asset_by_hash(&hash, &current.username)
        .await?
        .is_none()
    {
        return Err(ErrorCode::NotFound.into());
    }

    let mut expire_at = String::new();
    if req.expire_at > 0 {
        if req.expire_at < Utc::now().timestamp() {
            return Err(ErrorCode::InvalidParams.into());
        }
        expire_at = chrono::DateTime::from_timestamp(req.expire_at, 0)
            .ok_or(ErrorCode::InvalidParams)?
            .to_rfc3339();
    }

    if state.db.link_by_long(&req.url).await?.is_some() {
        return Err(ErrorCode::ShareLinkExists.into());
    }

    let short_link = format!("/link?cid={}&ts={}", req.cid, Utc::now().timestamp());
    state
        .db
        .create_link(&NewLink {
            username: current.username.clone(),
            cid: req.cid.clone(),
            short_link: short_link.clone(),
            long_link: req.url.clone(),
            short_pass: req.access_pass.clone(),
            expire_at,
        })
        .await?;

    Ok(ok(json!({ "url": short_link })))
}

#[derive(Debug, Deserialize)]
pub struct LinkQuery {
    pub username: String,
    pub cid: String,
}

pub async fn link_info(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LinkQuery>,
) -> ApiResult<Json<Value>> {
    let link = state
        .db
        .link_by_cid_user(&query.cid, &query.username)
        .await?
        .ok_or(ErrorCode::NotFound)?;

    let expire_days = link_expire_days(&link.expire_at, &link.updated_at);
    Ok(ok(json!({ "link": link, "expire_days": expire_days })))
}

fn link_expire_days(expire_at: &str, updated_at: &str) -> i64 {
    let Ok(expires) = chrono::DateTime::parse_from_rfc3339(expire_at) else {
        return 0;
    };
    let Ok(updated) = chrono::DateTime::parse_from_rfc3339(updated_at) else {
        return 0;
    };
    let hours = (expires - updated).num_hours();
    (hours as f64 / 24.0).round() as i64
}

pub async fn link_need_pass(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LinkQuery>,
) -> ApiResult<Json<Value>> {
    let link = state
        .db
        .link_by_cid_user(&query.cid, &query.username)
        .await?
        .ok_or(ErrorCode::NotFound)?;
    Ok(ok(json!({ "need_pass": !link.short_pass.is_empty() })))
}

#[derive(Debug, Deserialize)]
pub struct CheckLinkBody {
    pub cid: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
}

pub async fn check_link(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckLinkBody>,
) -> ApiResult<Json<Value>> {
    let link = state
        .db
        .link_by_cid_user(&req.cid, &req.username)
        .await?
        .ok_or(ErrorCode::NotFound)?;

    if !link.expire_at.is_empty() {
        let expires = chrono::DateTime::parse_from_rfc3339(&link.expire_at)
            .map_err(|_| ErrorCode::InternalServer)?;
        if expires < Utc::now() {
            return Err(ErrorCode::ShareLinkExpired.into());
        }
    }

    if !link.short_pass.is_empty() {
        if req.password.is_empty() {
            return Err(ErrorCode::ShareLinkPassRequired.into());
        }
        if link.short_pass != req.password {
            return Err(ErrorCode::ShareLinkPassIncorrect.into());
        }
    }

    Ok(ok(json!({ "msg": "success" })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateLinkBody {
    pub id: i64,
    #[serde(default)]
    pub short_pass: String,
    /// Unix seconds; zero leaves the expiry untouched.
    #[serde(default)]
    pub expire_at: i64,
}

pub async fn update_link(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<UpdateLinkBody>,
) -> ApiResult<Json<Value>> {
    let link = state
        .db
        .link_by_id(req.id)
        .await?
        .ok_or(ErrorCode::NotFound)?;

    if link.username != current.username {
        return Err(ErrorCode::LinkUserNotMatch.into());
    }

    let mut expire_at = link.expire_at.clone();
    if req.expire_at > 0 {
        if req.expire_at < Utc::now().timestamp() {
            return Err(ErrorCode::InvalidParams.into());
        }
        expire_at = chrono::DateTime::from_timestamp(req.expire_at, 0)
            .ok_or(ErrorCode::InvalidParams)?
            .to_rfc3339();
    }

    state
        .db
        .update_link(req.id, &req.short_pass, &expire_at)
        .await?;
    Ok(ok(json!({ "msg": "success" })))
}

// ---------------------------------------------------------------------------
// groups

#[derive(Debug, Deserialize)]
pub struct CreateGroupBody {
    pub name: String,
    #[serde(default)]
    pub parent: i64,
}

pub async fn create_group(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<CreateGroupBody>,
) -> ApiResult<Json<Value>> {
    if req.name.is_empty() {
        return Err(ErrorCode::InvalidParams.into());
    }
    let group = state
        .db
        .create_group(&current.username, &req.name, req.parent)
        .await?;
    Ok(ok(json!({ "group": group })))
}

#[derive(Debug, Deserialize)]
pub struct ListGroupsQuery {
    #[serde(default)]
    pub parent: i64,
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub page_size: i64,
}

pub async fn list_groups(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<ListGroupsQuery>,
) -> ApiResult<Json<Value>> {
    let page = Pagination {
        page: query.page,
        page_size: query.page_size,
    };
    let (total, groups) = state
        .db
        .list_groups(&current.username, query.parent, page.limit(), page.offset())
        .await?;
    Ok(ok(json!({ "list": groups, "total": total })))
}

#[derive(Debug, Deserialize)]
pub struct GroupIdQuery {
    pub group_id: i64,
}

pub async fn delete_group(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<GroupIdQuery>,
) -> ApiResult<Json<Value>> {
    state.db.delete_group(&current.username, query.group_id).await?;
    Ok(ok(json!({ "msg": "success" })))
}

#[derive(Debug, Deserialize)]
pub struct RenameBody {
    #[serde(default)]
    pub group_id: i64,
    #[serde(default)]
    pub asset_cid: String,
    pub new_name: String,
}

/// Renames an asset when `asset_cid` is given, otherwise a group.
pub async fn rename(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<RenameBody>,
) -> ApiResult<Json<Value>> {
    if req.new_name.is_empty() {
        return Err(ErrorCode::InvalidParams.into());
    }

    if !req.asset_cid.is_empty() {
        let hash = utils::cid_storage_key(&req.asset_cid);
        state
            .db
            .rename_asset(&current.username, &hash, &req.new_name)
            .await?;
    } else {
        state
            .db
            .rename_group(&current.username, req.group_id, &req.new_name)
            .await?;
    }

    Ok(ok(json!({ "msg": "success" })))
}

#[derive(Debug, Deserialize)]
pub struct MoveGroupBody {
    pub group_id: i64,
    pub target_group_id: i64,
}

pub async fn move_group(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<MoveGroupBody>,
) -> ApiResult<Json<Value>> {
    if req.group_id == req.target_group_id {
        return Err(ErrorCode::InvalidParams.into());
    }
    state
        .db
        .move_group(&current.username, req.group_id, req.target_group_id)
        .await?;
    Ok(ok(json!({ "msg": "success" })))
}

#[derive(Debug, Deserialize)]
pub struct MoveAssetBody {
    pub asset_cid: String,
    pub group_id: i64,
}

pub async fn move_asset(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<MoveAssetBody>,
) -> ApiResult<Json<Value>> {
    let hash = utils::cid_storage_key(&req.asset_cid);
    state
        .db
        .move_asset_to_group(&current.username, &hash, req.group_id)
        .await?;
    Ok(ok(json!({ "msg": "success" })))
}

// ---------------------------------------------------------------------------
// operator

#[derive(Debug, Deserialize)]
pub struct MoveNodeBody {
    pub node_id: String,
    pub from_area_id: String,
    pub to_area_id: String,
}

pub async fn move_node(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MoveNodeBody>,
) -> ApiResult<Json<Value>> {
    if req.node_id.is_empty() || req.from_area_id.is_empty() || req.to_area_id.is_empty() {
        return Err(ErrorCode::InvalidParams.into());
    }
    state
        .schedulers
        .migrate_node(&req.node_id, &req.from_area_id, &req.to_area_id)
        .await?;
    Ok(ok(json!({ "msg": "success" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expire_days_round() {
        assert_eq!(
            link_expire_days("2026-01-11T00:00:00+00:00", "2026-01-01T00:00:00+00:00"),
            10
        );
        assert_eq!(link_expire_days("", "2026-01-01T00:00:00+00:00"), 0);
    }
}
