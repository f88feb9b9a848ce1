//! Wire models for the `adapters` crate.
//!
//! These structs mirror the scheduler's JSON-RPC payloads one to one. They
//! are deliberately free of portal concerns so the backend services can treat
//! every area scheduler through the same shapes.

use serde::{Deserialize, Serialize};

/// Replica state the scheduler reports for a node holding an asset.
/// `3` means the replica finished pulling and is servable.
pub const REPLICA_STATUS_SUCCEEDED: i32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAssetRequest {
    pub user_id: String,
    pub asset_cid: String,
    pub asset_size: i64,
    pub node_id: String,
}

/// One candidate node a client may upload the asset body to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadEndpoint {
    pub upload_url: String,
    pub token: String,
    pub node_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAssetOutcome {
    pub already_exists: bool,
    #[serde(default)]
    pub endpoints: Vec<UploadEndpoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeUploadInfo {
    pub already_exists: bool,
    #[serde(default)]
    pub endpoints: Vec<UploadEndpoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaInfo {
    pub node_id: String,
    pub status: i32,
    pub is_candidate: bool,
    #[serde(default)]
    pub done_size: i64,
}

impl ReplicaInfo {
    pub fn is_succeeded(&self) -> bool {
        self.status == REPLICA_STATUS_SUCCEEDED
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRecord {
    pub cid: String,
    pub total_size: i64,
    #[serde(default)]
    pub replicas: Vec<ReplicaInfo>,
}

/// The scheduler's own view of a node, used to seed the portal's device row
/// when a node binds before any sync has happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub node_id: String,
    pub node_name: String,
    pub node_type: String,
    pub external_ip: String,
    #[serde(default)]
    pub system_version: String,
    #[serde(default)]
    pub online: bool,
}

/// Opaque handover state produced by `migrate_node_out`. The `key` must be
/// echoed back to the source area's `cleanup_node`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationBundle {
    pub node_id: String,
    pub key: String,
    pub payload: serde_json::Value,
}

/// Generic paginated list as the scheduler returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub items: Vec<T>,
    pub total: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplicaEvent {
    pub cid: String,
    pub event: String,
    pub done_size: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub validator_id: String,
    pub status: i32,
    pub block_number: i64,
    pub bandwidth: f64,
    pub duration: i64,
    pub start_time: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfitDetail {
    pub kind: i64,
    pub profit: f64,
    pub note: String,
    pub created_at: String,
}
