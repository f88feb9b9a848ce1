//! Core `adapters` crate for abstracting scheduler RPC interactions.
//!
//! This crate defines the `SchedulerClient` trait, which outlines the portal's
//! view of an area scheduler (asset placement, sharing, node migration), and
//! provides the JSON-RPC client implementation used against real deployments.
//! The scheduler service itself is owned by another project; only the client
//! side lives here.

pub mod errors;
pub mod models;
pub mod rpc;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::Result;
use crate::models::{
    AssetRecord, CreateAssetOutcome, CreateAssetRequest, MigrationBundle, NodeSnapshot,
    NodeUploadInfo, Page, ProfitDetail, ReplicaEvent, ValidationResult,
};

pub use errors::AdapterError;
pub use rpc::JsonRpcScheduler;

/// Client-side contract of an area scheduler.
///
/// One instance talks to one area's scheduler endpoint. Every call is a
/// network round trip; callers are expected to cache instances per area.
#[async_trait]
pub trait SchedulerClient: Send + Sync + std::fmt::Debug {
    /// Registers an asset for upload and returns candidate upload endpoints.
    async fn create_asset(&self, req: &CreateAssetRequest) -> Result<CreateAssetOutcome>;

    /// Removes the asset record for `cid` in this area.
    async fn remove_asset(&self, cid: &str) -> Result<()>;

    /// Produces download URLs for the given CIDs, keyed by CID.
    async fn share_assets(
        &self,
        user_id: &str,
        cids: &[String],
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<HashMap<String, Vec<String>>>;

    /// Produces download URLs for a password-protected asset.
    async fn share_encrypted_asset(
        &self,
        user_id: &str,
        cid: &str,
        pass: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Vec<String>>;

    /// Fetches the replica record for an asset in this area.
    async fn asset_record(&self, cid: &str) -> Result<AssetRecord>;

    /// Returns candidate upload endpoints for a user, optionally bound to an
    /// encryption pass nonce.
    async fn node_upload_info(
        &self,
        user_id: &str,
        pass_nonce: &str,
        url_mode: bool,
    ) -> Result<NodeUploadInfo>;

    /// Returns the node's signing public key (hex, compressed secp256k1).
    async fn node_public_key(&self, node_id: &str) -> Result<String>;

    /// Fetches the scheduler's view of a node, used to import devices the
    /// portal has not seen yet.
    async fn node_snapshot(&self, node_id: &str) -> Result<NodeSnapshot>;

    async fn replica_events(
        &self,
        node_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Page<ReplicaEvent>>;

    async fn validation_results(
        &self,
        node_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Page<ValidationResult>>;

    async fn profit_details(
        &self,
        node_id: &str,
        limit: i64,
        offset: i64,
        kinds: &[i64],
    ) -> Result<Page<ProfitDetail>>;

    /// Detaches a node from this area, returning the bundle the target area
    /// needs to take it over.
    async fn migrate_node_out(&self, node_id: &str) -> Result<MigrationBundle>;

    /// Attaches a previously detached node to this area.
    async fn migrate_node_in(&self, bundle: &MigrationBundle) -> Result<()>;

    /// Final cleanup on the source area after a completed migration.
    async fn cleanup_node(&self, node_id: &str, key: &str) -> Result<()>;
}
