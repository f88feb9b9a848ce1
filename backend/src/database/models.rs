//! Rust structs that represent database table mappings.
//!
//! These models define the structure of data as it is stored in and retrieved
//! from the database. Timestamps are RFC3339 TEXT columns; durations and time
//! math happen in the service layer.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 100 MiB granted to every account on first contact.
pub const STARTER_STORAGE_BYTES: i64 = 100 * 1024 * 1024;

pub const ROLE_ADMIN: i64 = 1;
pub const ROLE_KOL: i64 = 2;

pub const BIND_STATUS_BOUND: &str = "binding";
pub const BIND_STATUS_UNBOUND: &str = "unbinding";

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub pass_hash: String,
    pub user_email: String,
    pub wallet_address: String,
    pub role: i64,
    pub referrer_user_id: String,
    pub referrer_code: String,
    pub total_storage_size: i64,
    pub used_storage_size: i64,
    pub reward: f64,
    pub referral_reward: f64,
    #[serde(skip_serializing)]
    pub api_keys: String,
    pub enable_vip: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub pass_hash: String,
    pub user_email: String,
    pub referrer_user_id: String,
    pub referrer_code: String,
    pub total_storage_size: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ReferralCode {
    pub id: i64,
    pub user_id: String,
    pub code: String,
    pub created_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Kol {
    pub user_id: String,
    pub level: i64,
    pub status: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct KolLevelConf {
    pub level: i64,
    pub commission_percent: i64,
    pub parent_commission_percent: i64,
    pub user_threshold: i64,
    pub device_threshold: i64,
    pub status: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserAsset {
    pub user_id: String,
    pub hash: String,
    pub cid: String,
    pub asset_name: String,
    pub asset_type: String,
    pub total_size: i64,
    #[serde(skip_serializing)]
    pub password: String,
    pub group_id: i64,
    pub visit_count: i64,
    pub share_status: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewAsset {
    pub user_id: String,
    pub hash: String,
    pub cid: String,
    pub asset_name: String,
    pub asset_type: String,
    pub total_size: i64,
    pub password: String,
    pub group_id: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AssetGroup {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub parent: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DeviceInfo {
    pub device_id: String,
    pub user_id: String,
    pub device_name: String,
    pub bind_status: String,
    pub area_id: String,
    pub external_ip: String,
    pub ip_country: String,
    pub online: bool,
    pub system_version: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Binding code a device presents when attaching to an account. The `hash`
/// is the opaque code handed to the device out of band.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DeviceSignature {
    pub id: i64,
    pub hash: String,
    pub username: String,
    pub node_id: String,
    pub area_id: String,
    pub signature: String,
    pub created_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ShareLink {
    pub id: i64,
    pub username: String,
    pub cid: String,
    pub short_link: String,
    pub long_link: String,
    #[serde(skip_serializing)]
    pub short_pass: String,
    /// RFC3339, empty string means no expiry.
    pub expire_at: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewLink {
    pub username: String,
    pub cid: String,
    pub short_link: String,
    pub long_link: String,
    pub short_pass: String,
    pub expire_at: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub page_size: i64,
}

impl Pagination {
    pub fn limit(&self) -> i64 {
        if self.page_size <= 0 {
            50
        } else {
            self.page_size.min(500)
        }
    }

    pub fn offset(&self) -> i64 {
        let page = if self.page <= 0 { 1 } else { self.page };
        (page - 1) * self.limit()
    }
}
