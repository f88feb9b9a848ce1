//! Middleware for protecting authenticated routes and handling authorization.
//!
//! Validates the bearer token on every protected request and injects the
//! resolved `CurrentUser` into request extensions for the handlers.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;

use crate::auth::errors::AuthError;
use crate::auth::models::CurrentUser;
use crate::errors::{ApiError, ErrorCode};
use crate::state::AppState;

pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AuthError::MissingToken)?;

    let claims = state.auth.verify_token(token)?;
    req.extensions_mut().insert(CurrentUser {
        username: claims.sub,
        role: claims.role,
    });

    Ok(next.run(req).await)
}

/// Admin gate layered behind `require_auth` for operator endpoints.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    let user = req
        .extensions()
        .get::<CurrentUser>()
        .ok_or(AuthError::MissingToken)?;
    if user.role != crate::database::models::ROLE_ADMIN {
        return Err(ErrorCode::PermissionNotAllowed.into());
    }
    Ok(next.run(req).await)
}
