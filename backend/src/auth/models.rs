//! Data structures for authentication-related entities.
//!
//! This module defines the token claims, the verify-code kinds, and the
//! request/response bodies of the auth endpoints.

use serde::{Deserialize, Serialize};

/// Signed into every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Username the token was issued to.
    pub sub: String,
    pub role: i64,
    /// Unix seconds.
    pub exp: i64,
}

/// Authenticated identity injected into request extensions by the middleware.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub username: String,
    pub role: i64,
}

/// The flows a cached verify code can belong to. Codes from one flow are not
/// accepted by another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceKind {
    Register,
    Login,
    Reset,
    Signature,
    Deactivate,
}

impl NonceKind {
    pub fn key_part(self) -> &'static str {
        match self {
            NonceKind::Register => "register",
            NonceKind::Login => "login",
            NonceKind::Reset => "reset",
            NonceKind::Signature => "sign",
            NonceKind::Deactivate => "deactivate",
        }
    }

    /// Wire encoding used by the verify-code endpoint.
    pub fn from_wire(value: i64) -> Option<Self> {
        match value {
            1 => Some(NonceKind::Register),
            2 => Some(NonceKind::Login),
            3 => Some(NonceKind::Reset),
            4 => Some(NonceKind::Signature),
            5 => Some(NonceKind::Deactivate),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub verify_code: String,
    #[serde(default)]
    pub referrer: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    /// Unix seconds the token stops being accepted.
    pub expires_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub username: String,
    pub password: String,
    pub verify_code: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyCodeRequest {
    pub username: String,
    /// One of the `NonceKind` wire values.
    #[serde(rename = "type")]
    pub kind: i64,
}

#[derive(Debug, Deserialize)]
pub struct NonceQuery {
    pub username: String,
}
