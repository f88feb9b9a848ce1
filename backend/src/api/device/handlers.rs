//! Handler functions for the device API.
//!
//! These functions process binding requests from devices, ownership changes
//! from the portal, and the dashboard lists that are proxied to the device's
//! area scheduler.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::ok;
use crate::auth::models::CurrentUser;
use crate::auth::verify_device_signature;
use crate::database::models::{DeviceInfo, BIND_STATUS_UNBOUND};
use crate::database::now_rfc3339;
use crate::errors::{ApiResult, ErrorCode};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BindDeviceRequest {
    /// Binding code the portal issued to the owner out of band.
    pub hash: String,
    pub node_id: String,
    pub signature: String,
    #[serde(default)]
    pub area_id: String,
    #[serde(default)]
    pub remark: String,
}

/// Called by the device: it proves control of its node key by signing the
/// binding code, and the portal attaches it to the code's account.
pub async fn bind_device(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BindDeviceRequest>,
) -> ApiResult<Json<Value>> {
    if req.signature.is_empty() || req.node_id.is_empty() {
        return Err(ErrorCode::InvalidParams.into());
    }

    let binding = state
        .db
        .signature_by_hash(&req.hash)
        .await?
        .ok_or(ErrorCode::InvalidSignature)?;

    // Unknown devices are imported from the scheduler on first contact.
    let device = match state.db.device_by_id(&req.node_id).await? {
        Some(device) => device,
        None => import_device(&state, &req.node_id, &req.area_id).await?,
    };

    if !device.user_id.is_empty() {
        return Err(ErrorCode::DeviceBound.into());
    }

    let scheduler = state.schedulers.resolve(&req.area_id).await?;
    let pubkey = scheduler.node_public_key(&req.node_id).await?;
    verify_device_signature(&pubkey, req.hash.as_bytes(), &req.signature)?;

    let name = if req.remark.is_empty() {
        device.device_name.clone()
    } else {
        req.remark.clone()
    };

    state
        .db
        .bind_device(&req.node_id, &binding.username, &name)
        .await?;

    state
        .db
        .update_signature(&req.hash, &req.node_id, &req.area_id, &req.signature)
        .await?;

    tracing::info!(node = %req.node_id, user = %binding.username, "device bound");
    Ok(ok(json!({ "msg": "success" })))
}

/// Issues the binding code the owner hands to a device. The device later
/// proves control of its key by signing exactly this code.
pub async fn binding_code(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    let code = crate::utils::random_code(32);
    state
        .db
        .insert_signature(&code, &current.username, "", "", "")
        .await?;
    Ok(ok(json!({ "code": code })))
}

async fn import_device(
    state: &Arc<AppState>,
    node_id: &str,
    area_id: &str,
) -> ApiResult<DeviceInfo> {
    let scheduler = state.schedulers.resolve(area_id).await?;
    let snapshot = scheduler
        .node_snapshot(node_id)
        .await
        .map_err(|_| ErrorCode::DeviceNotExists)?;

    let now = now_rfc3339();
    let device = DeviceInfo {
        device_id: snapshot.node_id,
        user_id: String::new(),
        device_name: snapshot.node_name,
        bind_status: BIND_STATUS_UNBOUND.to_string(),
        area_id: if area_id.is_empty() {
            state.schedulers.default_area().to_string()
        } else {
            area_id.to_string()
        },
        external_ip: snapshot.external_ip,
        ip_country: String::new(),
        online: snapshot.online,
        system_version: snapshot.system_version,
        created_at: now.clone(),
        updated_at: now,
    };
    state.db.upsert_device(&device).await?;
    Ok(device)
}

#[derive(Debug, Deserialize)]
pub struct DeviceActionRequest {
    pub device_id: String,
    #[serde(default)]
    pub device_name: String,
}

pub async fn unbind_device(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<DeviceActionRequest>,
) -> ApiResult<Json<Value>> {
    let device = state
        .db
        .device_by_id(&req.device_id)
        .await?
        .ok_or(ErrorCode::DeviceNotExists)?;

    if device.user_id != current.username {
        return Err(ErrorCode::UnbindingNotAllowed.into());
    }

    state.db.unbind_device(&req.device_id).await?;
    Ok(ok(json!({ "msg": "success" })))
}

pub async fn rename_device(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<DeviceActionRequest>,
) -> ApiResult<Json<Value>> {
    let device = state
        .db
        .device_by_id(&req.device_id)
        .await?
        .ok_or(ErrorCode::DeviceNotExists)?;

    if device.user_id != current.username {
        return Err(ErrorCode::PermissionNotAllowed.into());
    }

    state
        .db
        .rename_device(&req.device_id, &req.device_name)
        .await?;
    Ok(ok(json!({ "msg": "success" })))
}

#[derive(Debug, Deserialize)]
pub struct DeviceListQuery {
    pub device_id: String,
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub page_size: i64,
    /// Comma-separated profit kinds, only used by the profit list.
    #[serde(default)]
    pub kinds: String,
}

impl DeviceListQuery {
    fn limit(&self) -> i64 {
        if self.page_size <= 0 {
            50
        } else {
            self.page_size.min(500)
        }
    }

    fn offset(&self) -> i64 {
        let page = if self.page <= 0 { 1 } else { self.page };
        (page - 1) * self.limit()
    }
}

/// Resolves the device's own area scheduler for dashboard queries.
async fn device_scheduler(
    state: &Arc<AppState>,
    device_id: &str,
) -> ApiResult<(DeviceInfo, Arc<dyn adapters::SchedulerClient>)> {
    let device = state
        .db
        .device_by_id(device_id)
        .await?
        .ok_or(ErrorCode::DeviceNotExists)?;
    let scheduler = state.schedulers.resolve(&device.area_id).await?;
    Ok((device, scheduler))
}

pub async fn replica_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DeviceListQuery>,
) -> ApiResult<Json<Value>> {
    if query.device_id.is_empty() {
        return Err(ErrorCode::InvalidParams.into());
    }
    let (_, scheduler) = device_scheduler(&state, &query.device_id).await?;
    let page = scheduler
        .replica_events(&query.device_id, query.limit(), query.offset())
        .await?;
    Ok(ok(json!({ "list": page.items, "total": page.total })))
}

pub async fn validation_results(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DeviceListQuery>,
) -> ApiResult<Json<Value>> {
    if query.device_id.is_empty() {
        return Err(ErrorCode::InvalidParams.into());
    }
    let (_, scheduler) = device_scheduler(&state, &query.device_id).await?;
    let page = scheduler
        .validation_results(&query.device_id, query.limit(), query.offset())
        .await?;
    Ok(ok(json!({ "list": page.items, "total": page.total })))
}

pub async fn profit_details(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DeviceListQuery>,
) -> ApiResult<Json<Value>> {
    if query.device_id.is_empty() {
        return Err(ErrorCode::InvalidParams.into());
    }

    let kinds: Vec<i64> = query
        .kinds
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    let (_, scheduler) = device_scheduler(&state, &query.device_id).await?;
    let page = scheduler
        .profit_details(&query.device_id, query.limit(), query.offset(), &kinds)
        .await?;
    Ok(ok(json!({ "list": page.items, "total": page.total })))
}
