//! Custom error types specific to authentication failures.
//!
//! This module defines the errors that can occur during login, token
//! verification, verify-code checks and wallet signature recovery, and maps
//! each one onto the stable numeric API codes.

use thiserror::Error;

use crate::errors::{ApiError, ErrorCode};

pub type Result<T> = std::result::Result<T, AuthError>;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("incorrect username or password")]
    WrongPassword,

    #[error("password not allowed")]
    PasswordNotAllowed,

    #[error("verify code mismatch")]
    InvalidVerifyCode,

    #[error("verify code expired")]
    VerifyCodeExpired,

    #[error("verify code requested too frequently")]
    VerifyCodeTooOften,

    #[error("unsupported verify code type")]
    UnsupportedVerifyCodeKind,

    #[error("signature rejected: {0}")]
    InvalidSignature(String),

    #[error("auth internal error: {0}")]
    Internal(String),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let code = match &err {
            AuthError::MissingToken | AuthError::InvalidToken => ErrorCode::InvalidToken,
            AuthError::WrongPassword => ErrorCode::WrongPassword,
            AuthError::PasswordNotAllowed => ErrorCode::PasswordNotAllowed,
            AuthError::InvalidVerifyCode => ErrorCode::InvalidVerifyCode,
            AuthError::VerifyCodeExpired => ErrorCode::VerifyCodeExpired,
            AuthError::VerifyCodeTooOften => ErrorCode::VerifyCodeTooOften,
            AuthError::UnsupportedVerifyCodeKind => ErrorCode::UnsupportedVerifyCodeKind,
            AuthError::InvalidSignature(_) => ErrorCode::InvalidSignature,
            AuthError::Internal(msg) => {
                tracing::error!("{msg}");
                ErrorCode::InternalServer
            }
        };
        ApiError::Code(code)
    }
}
