//! Custom error types specific to the `adapters` crate.
//!
//! This module defines errors that can occur during scheduler connection,
//! RPC calls, or response decoding, providing a unified error handling
//! mechanism for all scheduler interactions.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AdapterError>;

/// RPC error code the scheduler returns when an asset hash has no record in
/// that area. The delete fan-out treats it as "already gone".
pub const RPC_HASH_NOT_FOUND: i64 = -20;

#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("scheduler connection error: {0}")]
    Connection(String),

    #[error("scheduler rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("malformed scheduler response: {0}")]
    Decode(String),
}

impl AdapterError {
    /// True when the scheduler reported that the asset hash is unknown.
    pub fn is_hash_not_found(&self) -> bool {
        matches!(self, AdapterError::Rpc { code, .. } if *code == RPC_HASH_NOT_FOUND)
    }

    /// The scheduler-supplied error code, when one exists.
    pub fn rpc_code(&self) -> Option<i64> {
        match self {
            AdapterError::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        AdapterError::Connection(err.to_string())
    }
}
