//! Handler functions for user profile and management API endpoints.
//!
//! These functions process requests for user data, interact with the database
//! and the auth service, and return user-specific information.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::ok;
use crate::auth::models::CurrentUser;
use crate::auth::recover_wallet_address;
use crate::database::models::{Pagination, ROLE_KOL};
use crate::errors::{ApiResult, ErrorCode};
use crate::state::AppState;
use crate::utils;

const MAX_REFERRAL_CODES: i64 = 5;

pub async fn user_info(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    let user = state
        .db
        .user_by_username(&current.username)
        .await?
        .ok_or(ErrorCode::UserNotFound)?;

    let codes = state.db.referral_codes_for_user(&current.username).await?;
    let referral_code = codes.first().map(|c| c.code.clone()).unwrap_or_default();

    Ok(ok(json!({
        "username": user.username,
        "user_email": user.user_email,
        "wallet_address": user.wallet_address,
        "role": user.role,
        "referral_code": referral_code,
        "reward": user.reward,
        "referral_reward": user.referral_reward,
        "total_storage_size": user.total_storage_size,
        "used_storage_size": user.used_storage_size,
        "enable_vip": user.enable_vip,
        "created_at": user.created_at,
    })))
}

pub async fn storage_size(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    let user = state
        .db
        .user_by_username(&current.username)
        .await?
        .ok_or(ErrorCode::UserNotFound)?;

    Ok(ok(json!({
        "total_size": user.total_storage_size,
        "used_size": user.used_storage_size,
    })))
}

pub async fn vip_info(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    let user = state
        .db
        .user_by_username(&current.username)
        .await?
        .ok_or(ErrorCode::UserNotFound)?;

    Ok(ok(json!({ "vip": user.enable_vip, "uid": user.username })))
}

#[derive(Debug, Deserialize)]
pub struct BindWalletRequest {
    pub sign: String,
    pub address: String,
}

/// Binds a wallet by recovering the signer of the cached sign-in nonce and
/// comparing it against the claimed address.
pub async fn bind_wallet(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<BindWalletRequest>,
) -> ApiResult<Json<Value>> {
    let nonce = state
        .auth
        .signature_nonce(&current.username)
        .await?
        .ok_or(ErrorCode::VerifyCodeExpired)?;

    let recovered = recover_wallet_address(&nonce, &req.sign)?;
    if !recovered.eq_ignore_ascii_case(&req.address) {
        return Err(ErrorCode::InvalidSignature.into());
    }

    let user = state
        .db
        .user_by_username(&current.username)
        .await?
        .ok_or(ErrorCode::UserNotFound)?;
    if !user.wallet_address.is_empty() {
        return Err(ErrorCode::WalletBound.into());
    }

    state.db.update_wallet(&current.username, &recovered).await?;
    Ok(ok(json!({ "msg": "success" })))
}

pub async fn unbind_wallet(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    if state.db.user_by_username(&current.username).await?.is_none() {
        return Err(ErrorCode::UserNotFound.into());
    }
    state.db.update_wallet(&current.username, "").await?;
    Ok(ok(json!({ "msg": "success" })))
}

/// Referral roster plus the caller's codes and KOL level-up progress.
pub async fn referral_list(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Value>> {
    let user = state
        .db
        .user_by_username(&current.username)
        .await?
        .ok_or(ErrorCode::UserNotFound)?;

    let (total, roster) = state
        .db
        .referral_roster(&current.username, page.limit(), page.offset())
        .await?;

    let mut list = Vec::with_capacity(roster.len());
    for referee in &roster {
        let reward = state
            .db
            .referral_reward_for(&current.username, &referee.username)
            .await?
            .unwrap_or(0.0);
        list.push(json!({
            "email": utils::mask_email(&referee.user_email),
            "joined_at": referee.created_at,
            "reward": reward,
        }));
    }

    let codes = state.db.referral_codes_for_user(&current.username).await?;

    // KOL progress: current level plus the threshold for the next one.
    let kol = state.db.kol_for_user(&current.username).await?;
    let current_level = kol.map(|k| k.level).unwrap_or(0);
    let level_conf = state.db.kol_level_conf(current_level).await?;
    let referral_nodes = state.db.referred_device_count(&current.username).await?;

    let kol_level = level_conf.map(|conf| {
        json!({
            "current_level": current_level,
            "commission_percent": conf.commission_percent,
            "parent_commission_percent": conf.parent_commission_percent,
            "referral_nodes": referral_nodes,
            "level_up_referral_nodes": conf.device_threshold,
        })
    });

    Ok(ok(json!({
        "list": list,
        "total": total,
        "total_reward": user.referral_reward,
        "referral_codes": codes,
        "kol_level": kol_level,
    })))
}

pub async fn add_referral_code(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    let existing = state.db.count_referral_codes(&current.username).await?;
    if existing >= MAX_REFERRAL_CODES {
        return Err(ErrorCode::ReferralCodeLimit.into());
    }

    let code = utils::random_code(6);
    state
        .db
        .insert_referral_code(&current.username, &code)
        .await?;

    Ok(ok(json!({ "code": code })))
}

#[derive(Debug, Deserialize)]
pub struct ReferralCodeQuery {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ReferralStatQuery {
    pub code: String,
    /// `referral_users` (default) or `referral_nodes`.
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
}

/// Daily time series for one referral code, defaulting to the last 14 days.
pub async fn referral_code_stats(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<ReferralStatQuery>,
) -> ApiResult<Json<Value>> {
    let owner = state
        .db
        .user_by_referral_code(&query.code)
        .await?
        .ok_or(ErrorCode::InvalidReferralCode)?;
    if owner.username != current.username {
        return Err(ErrorCode::InvalidReferralCode.into());
    }

    let now = chrono::Utc::now();
    let from = if query.from.is_empty() {
        (now - chrono::Duration::days(14)).to_rfc3339()
    } else {
        query.from.clone()
    };
    let to = if query.to.is_empty() {
        now.to_rfc3339()
    } else {
        query.to.clone()
    };

    let rows = match query.kind.as_str() {
        "referral_nodes" => {
            state
                .db
                .referral_node_daily_stat(&query.code, &from, &to)
                .await?
        }
        _ => {
            state
                .db
                .referral_user_daily_stat(&query.code, &from, &to)
                .await?
        }
    };

    let list: Vec<Value> = rows
        .into_iter()
        .map(|(date, value)| json!({ "date": date, "value": value }))
        .collect();
    Ok(ok(json!({ "list": list })))
}

pub async fn referral_code_detail(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<ReferralCodeQuery>,
) -> ApiResult<Json<Value>> {
    let owner = state
        .db
        .user_by_referral_code(&query.code)
        .await?
        .ok_or(ErrorCode::InvalidReferralCode)?;

    // KOL codes are publicly resolvable; detail stats are owner-only.
    if owner.username != current.username && owner.role != ROLE_KOL {
        return Err(ErrorCode::InvalidReferralCode.into());
    }

    let referral_users = state.db.count_users_by_referral_code(&query.code).await?;
    let referral_nodes = state.db.count_devices_by_referral_code(&query.code).await?;

    Ok(ok(json!({
        "code": query.code,
        "referral_users": referral_users,
        "referral_nodes": referral_nodes,
    })))
}
