//! Handler functions for authentication-related API endpoints.
//!
//! These functions process incoming HTTP requests for registration, login,
//! password reset and verify-code issuance, validate input, and delegate the
//! core logic to `auth::service`.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde_json::{json, Value};

use crate::api::ok;
use crate::auth::models::{
    LoginRequest, LoginResponse, NonceKind, NonceQuery, RegisterRequest, ResetPasswordRequest,
    VerifyCodeRequest,
};
use crate::database::models::{NewUser, STARTER_STORAGE_BYTES};
use crate::errors::{ApiResult, ErrorCode};
use crate::state::AppState;
use crate::utils;

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Json<Value>> {
    if req.username.is_empty() {
        return Err(ErrorCode::InvalidParams.into());
    }

    if state.db.user_by_username(&req.username).await?.is_some() {
        return Err(ErrorCode::UserExists.into());
    }

    let mut user = NewUser {
        username: req.username.clone(),
        user_email: req.username.clone(),
        total_storage_size: STARTER_STORAGE_BYTES,
        ..Default::default()
    };

    if !req.referrer.is_empty() {
        let referrer = state
            .db
            .user_by_referral_code(&req.referrer)
            .await?
            .ok_or(ErrorCode::InvalidReferralCode)?;
        user.referrer_user_id = referrer.username;
        user.referrer_code = req.referrer.clone();
    }

    user.pass_hash = state.auth.hash_password(&req.password)?;

    state
        .auth
        .consume_verify_code(NonceKind::Register, &req.username, &req.verify_code)
        .await?;

    state.db.create_user(&user).await?;
    tracing::info!(username = %req.username, "account registered");

    Ok(ok(json!({ "msg": "success" })))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<Value>> {
    let user = state
        .db
        .user_by_username(&req.username)
        .await?
        .ok_or(ErrorCode::WrongPassword)?;

    state.auth.verify_password(&req.password, &user.pass_hash)?;

    let (token, expires_at) = state.auth.issue_token(&user.username, user.role)?;
    Ok(ok(LoginResponse { token, expires_at }))
}

pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<Json<Value>> {
    if state.db.user_by_username(&req.username).await?.is_none() {
        return Err(ErrorCode::UserNotFound.into());
    }

    let pass_hash = state.auth.hash_password(&req.password)?;

    state
        .auth
        .consume_verify_code(NonceKind::Reset, &req.username, &req.verify_code)
        .await?;

    state.db.update_password(&req.username, &pass_hash).await?;
    Ok(ok(json!({ "msg": "success" })))
}

/// Issues the emailed verify code. Mail delivery is an external collaborator;
/// the code is cached here and handed to the mailer out of band.
pub async fn send_verify_code(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyCodeRequest>,
) -> ApiResult<Json<Value>> {
    if req.username.is_empty() {
        return Err(ErrorCode::InvalidParams.into());
    }
    let kind = NonceKind::from_wire(req.kind).ok_or(ErrorCode::UnsupportedVerifyCodeKind)?;

    let code = state.auth.issue_verify_code(kind, &req.username).await?;
    tracing::info!(username = %req.username, kind = kind.key_part(), len = code.len(), "verify code issued");

    Ok(ok(json!({ "msg": "success" })))
}

/// Issues a wallet-sign nonce. First contact provisions the account with the
/// starter quota, which is how wallet-only users come into existence.
pub async fn signature_nonce(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NonceQuery>,
) -> ApiResult<Json<Value>> {
    if query.username.is_empty() {
        return Err(ErrorCode::InvalidParams.into());
    }

    let nonce = state.auth.issue_signature_nonce(&query.username).await?;

    match state.db.user_by_username(&query.username).await? {
        None => {
            state
                .db
                .create_user(&NewUser {
                    username: query.username.clone(),
                    user_email: query.username.clone(),
                    total_storage_size: STARTER_STORAGE_BYTES,
                    ..Default::default()
                })
                .await?;
            let code = utils::random_code(6);
            if let Err(e) = state.db.insert_referral_code(&query.username, &code).await {
                tracing::error!("seed referral code: {e}");
            }
        }
        Some(user) if user.total_storage_size == 0 => {
            state
                .db
                .update_total_storage(&user.username, STARTER_STORAGE_BYTES)
                .await?;
        }
        Some(_) => {}
    }

    Ok(ok(json!({ "code": nonce })))
}
