//! JSON-RPC client for area schedulers.
//!
//! Schedulers expose a JSON-RPC 2.0 endpoint over plain HTTP behind a bearer
//! token. This module owns the envelope handling and error mapping; the
//! method surface is the `SchedulerClient` trait.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::{AdapterError, Result};
use crate::models::{
    AssetRecord, CreateAssetOutcome, CreateAssetRequest, MigrationBundle, NodeSnapshot,
    NodeUploadInfo, Page, ProfitDetail, ReplicaEvent, ValidationResult,
};
use crate::SchedulerClient;

const RPC_NAMESPACE: &str = "scheduler";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub struct JsonRpcScheduler {
    http: reqwest::Client,
    endpoint: String,
    token: String,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorFrame>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorFrame {
    code: i64,
    message: String,
}

impl JsonRpcScheduler {
    /// Builds a client for one scheduler endpoint. The endpoint advertised in
    /// the area config is an https URL; the RPC port only speaks plain HTTP,
    /// so the scheme is rewritten here.
    pub fn connect(endpoint: &str, token: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AdapterError::Connection(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: normalize_endpoint(endpoint),
            token: token.to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(endpoint = %self.endpoint, method, id, "scheduler rpc");
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": format!("{RPC_NAMESPACE}.{method}"),
            "params": params,
        });

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AdapterError::Connection(format!(
                "{} returned http {status}",
                self.endpoint
            )));
        }

        let envelope: RpcEnvelope = resp
            .json()
            .await
            .map_err(|e| AdapterError::Decode(e.to_string()))?;
        decode_envelope(envelope)
    }
}

fn normalize_endpoint(endpoint: &str) -> String {
    endpoint.replacen("https://", "http://", 1)
}

fn decode_envelope<T: DeserializeOwned>(envelope: RpcEnvelope) -> Result<T> {
    if let Some(frame) = envelope.error {
        return Err(AdapterError::Rpc {
            code: frame.code,
            message: frame.message,
        });
    }
    serde_json::from_value(envelope.result.unwrap_or(Value::Null))
        .map_err(|e| AdapterError::Decode(e.to_string()))
}

fn expiry_param(expires_at: Option<DateTime<Utc>>) -> Value {
    match expires_at {
        Some(ts) => json!(ts.to_rfc3339()),
        None => Value::Null,
    }
}

#[async_trait]
impl SchedulerClient for JsonRpcScheduler {
    async fn create_asset(&self, req: &CreateAssetRequest) -> Result<CreateAssetOutcome> {
        self.call("CreateAsset", json!([req])).await
    }

    async fn remove_asset(&self, cid: &str) -> Result<()> {
        self.call("RemoveAssetRecord", json!([cid])).await
    }

    async fn share_assets(
        &self,
        user_id: &str,
        cids: &[String],
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<HashMap<String, Vec<String>>> {
        self.call("ShareAssets", json!([user_id, cids, expiry_param(expires_at)]))
            .await
    }

    async fn share_encrypted_asset(
        &self,
        user_id: &str,
        cid: &str,
        pass: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Vec<String>> {
        self.call(
            "ShareEncryptedAsset",
            json!([user_id, cid, pass, expiry_param(expires_at)]),
        )
        .await
    }

    async fn asset_record(&self, cid: &str) -> Result<AssetRecord> {
        self.call("GetAssetRecord", json!([cid])).await
    }

    async fn node_upload_info(
        &self,
        user_id: &str,
        pass_nonce: &str,
        url_mode: bool,
    ) -> Result<NodeUploadInfo> {
        self.call("GetNodeUploadInfo", json!([user_id, pass_nonce, url_mode]))
            .await
    }

    async fn node_public_key(&self, node_id: &str) -> Result<String> {
        self.call("GetNodePublicKey", json!([node_id])).await
    }

    async fn node_snapshot(&self, node_id: &str) -> Result<NodeSnapshot> {
        self.call("GetNodeInfo", json!([node_id])).await
    }

    async fn replica_events(
        &self,
        node_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Page<ReplicaEvent>> {
        self.call("GetReplicaEventsForNode", json!([node_id, limit, offset]))
            .await
    }

    async fn validation_results(
        &self,
        node_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Page<ValidationResult>> {
        self.call("GetValidationResults", json!([node_id, limit, offset]))
            .await
    }

    async fn profit_details(
        &self,
        node_id: &str,
        limit: i64,
        offset: i64,
        kinds: &[i64],
    ) -> Result<Page<ProfitDetail>> {
        self.call(
            "GetProfitDetailsForNode",
            json!([node_id, limit, offset, kinds]),
        )
        .await
    }

    async fn migrate_node_out(&self, node_id: &str) -> Result<MigrationBundle> {
        self.call("MigrateNodeOut", json!([node_id])).await
    }

    async fn migrate_node_in(&self, bundle: &MigrationBundle) -> Result<()> {
        self.call("MigrateNodeIn", json!([bundle])).await
    }

    async fn cleanup_node(&self, node_id: &str, key: &str) -> Result<()> {
        self.call("CleanupNode", json!([node_id, key])).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RPC_HASH_NOT_FOUND;

    #[test]
    fn endpoint_scheme_is_rewritten() {
        assert_eq!(
            normalize_endpoint("https://sched-1.example.com/rpc/v0"),
            "http://sched-1.example.com/rpc/v0"
        );
        assert_eq!(
            normalize_endpoint("http://sched-1.example.com/rpc/v0"),
            "http://sched-1.example.com/rpc/v0"
        );
    }

    #[test]
    fn result_frames_decode() {
        let envelope: RpcEnvelope = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"result":{"already_exists":false,"endpoints":[{"upload_url":"http://n1/upload","token":"t","node_id":"n1"}]}}"#,
        )
        .unwrap();

        let outcome: CreateAssetOutcome = decode_envelope(envelope).unwrap();
        assert!(!outcome.already_exists);
        assert_eq!(outcome.endpoints.len(), 1);
        assert_eq!(outcome.endpoints[0].node_id, "n1");
    }

    #[test]
    fn error_frames_carry_scheduler_codes() {
        let envelope: RpcEnvelope = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":2,"error":{"code":-20,"message":"hash not found"}}"#,
        )
        .unwrap();

        let err = decode_envelope::<AssetRecord>(envelope).unwrap_err();
        assert!(err.is_hash_not_found());
        assert_eq!(err.rpc_code(), Some(RPC_HASH_NOT_FOUND));
    }

    #[test]
    fn null_results_decode_to_unit() {
        let envelope: RpcEnvelope =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":3,"result":null}"#).unwrap();
        decode_envelope::<()>(envelope).unwrap();
    }
}
