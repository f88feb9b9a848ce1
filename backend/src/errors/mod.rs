//! Global application error types and handlers.
//!
//! The portal frontend dispatches on a stable numeric `code` field, so every
//! failure is rendered as an HTTP 200 envelope `{"code": N, "msg": ...}`.
//! Scheduler RPC errors pass their own codes through verbatim.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use adapters::AdapterError;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum ErrorCode {
    InternalServer = 1001,
    InvalidParams = 1002,
    NotFound = 1003,

    UserExists = 2001,
    UserNotFound = 2002,
    WrongPassword = 2003,
    InvalidVerifyCode = 2004,
    VerifyCodeExpired = 2005,
    UnsupportedVerifyCodeKind = 2006,
    PasswordNotAllowed = 2007,
    InvalidReferralCode = 2008,
    WalletBound = 2009,
    VerifyCodeTooOften = 2010,
    ReferralCodeLimit = 2011,
    InvalidSignature = 2012,
    InvalidToken = 2013,

    DeviceNotExists = 3001,
    DeviceBound = 3002,
    UnbindingNotAllowed = 3003,
    PermissionNotAllowed = 3004,

    FileExists = 4001,
    NoSchedulerFound = 4002,
    StorageQuotaExceeded = 4003,
    ShareLinkExpired = 4004,
    ShareLinkPassRequired = 4005,
    ShareLinkPassIncorrect = 4006,
    ShareLinkExists = 4007,
    VisitLimitReached = 4008,
    LinkUserNotMatch = 4009,
}

impl ErrorCode {
    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::InternalServer => "server error",
            ErrorCode::InvalidParams => "invalid params",
            ErrorCode::NotFound => "not found",
            ErrorCode::UserExists => "account already exists",
            ErrorCode::UserNotFound => "account not found",
            ErrorCode::WrongPassword => "incorrect username or password",
            ErrorCode::InvalidVerifyCode => "invalid verify code",
            ErrorCode::VerifyCodeExpired => "verify code expired",
            ErrorCode::UnsupportedVerifyCodeKind => "unsupported verify code type",
            ErrorCode::PasswordNotAllowed => "password not allowed",
            ErrorCode::InvalidReferralCode => "invalid referral code",
            ErrorCode::WalletBound => "wallet already bound",
            ErrorCode::VerifyCodeTooOften => "verify code requested too frequently",
            ErrorCode::ReferralCodeLimit => "referral code limit reached",
            ErrorCode::InvalidSignature => "invalid signature",
            ErrorCode::InvalidToken => "invalid or expired token",
            ErrorCode::DeviceNotExists => "device not found",
            ErrorCode::DeviceBound => "device already bound",
            ErrorCode::UnbindingNotAllowed => "unbinding not allowed",
            ErrorCode::PermissionNotAllowed => "permission not allowed",
            ErrorCode::FileExists => "file already exists",
            ErrorCode::NoSchedulerFound => "no scheduler found",
            ErrorCode::StorageQuotaExceeded => "storage quota exceeded",
            ErrorCode::ShareLinkExpired => "share link expired",
            ErrorCode::ShareLinkPassRequired => "share link password required",
            ErrorCode::ShareLinkPassIncorrect => "share link password incorrect",
            ErrorCode::ShareLinkExists => "share link already exists",
            ErrorCode::VisitLimitReached => "share visit limit reached",
            ErrorCode::LinkUserNotMatch => "link does not belong to this user",
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{}", .0.message())]
    Code(ErrorCode),

    /// Scheduler-supplied error, surfaced with the scheduler's own code.
    #[error("{message}")]
    Scheduler { code: i64, message: String },
}

impl ApiError {
    pub fn code(&self) -> i64 {
        match self {
            ApiError::Code(c) => *c as i64,
            ApiError::Scheduler { code, .. } => *code,
        }
    }
}

impl From<ErrorCode> for ApiError {
    fn from(code: ErrorCode) -> Self {
        ApiError::Code(code)
    }
}

impl From<AdapterError> for ApiError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::Rpc { code, message } => ApiError::Scheduler { code, message },
            other => {
                tracing::error!("scheduler call failed: {other}");
                ApiError::Code(ErrorCode::InternalServer)
            }
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::Code(ErrorCode::NotFound),
            other => {
                tracing::error!("database error: {other}");
                ApiError::Code(ErrorCode::InternalServer)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "code": self.code(),
            "msg": self.to_string(),
        });
        (StatusCode::OK, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ErrorCode::InternalServer as i64, 1001);
        assert_eq!(ErrorCode::UserExists as i64, 2001);
        assert_eq!(ErrorCode::DeviceNotExists as i64, 3001);
        assert_eq!(ErrorCode::FileExists as i64, 4001);
    }

    #[test]
    fn scheduler_codes_pass_through() {
        let err: ApiError = AdapterError::Rpc {
            code: 1027,
            message: "storage size not enough".into(),
        }
        .into();
        assert_eq!(err.code(), 1027);
    }
}
