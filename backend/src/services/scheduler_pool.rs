//! Area-to-scheduler resolution and multi-area fan-out.
//!
//! Storage nodes are grouped into areas, each served by its own scheduler
//! endpoint. Handlers resolve an area to a cached RPC client here; operations
//! that span areas (delete, migration, replica counting) fan out concurrently
//! and aggregate partial successes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinSet;

use adapters::{AdapterError, JsonRpcScheduler, SchedulerClient};

use crate::cache::{sched_cfg_key, Cache, CacheError, SCHED_AREAS_KEY};
use crate::database::Db;
use crate::errors::{ApiError, ErrorCode};

/// One scheduler endpoint as registered in the cache under
/// `portal::sched::cfg::{area}`. The value is a JSON list; the first entry
/// wins, the rest are spares kept by whatever populates the config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AreaEndpoint {
    pub url: String,
    pub token: String,
}

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("no scheduler found")]
    NoScheduler,

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

impl From<PoolError> for ApiError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::NoScheduler => ErrorCode::NoSchedulerFound.into(),
            PoolError::Cache(e) => e.into(),
            PoolError::Adapter(e) => e.into(),
        }
    }
}

pub type SchedulerFactory =
    Arc<dyn Fn(&AreaEndpoint) -> Result<Arc<dyn SchedulerClient>, AdapterError> + Send + Sync>;

pub struct SchedulerPool {
    clients: DashMap<String, Arc<dyn SchedulerClient>>,
    cache: Arc<dyn Cache>,
    default_area: String,
    factory: SchedulerFactory,
}

/// Result of a delete fan-out: the areas where the asset is confirmed gone.
#[derive(Debug)]
pub struct FanoutOutcome {
    pub succeeded: Vec<String>,
    pub requested: usize,
}

impl FanoutOutcome {
    pub fn is_partial(&self) -> bool {
        self.succeeded.len() < self.requested
    }
}

#[derive(Debug, Default)]
pub struct ReplicaCounts {
    pub areas: usize,
    pub candidates: i64,
    pub edges: i64,
}

impl SchedulerPool {
    pub fn new(cache: Arc<dyn Cache>, default_area: String, factory: SchedulerFactory) -> Self {
        Self {
            clients: DashMap::new(),
            cache,
            default_area,
            factory,
        }
    }

    /// Production pool: clients are JSON-RPC connections built on demand.
    pub fn with_rpc_clients(cache: Arc<dyn Cache>, default_area: String) -> Self {
        let factory: SchedulerFactory = Arc::new(|endpoint: &AreaEndpoint| {
            let client = JsonRpcScheduler::connect(&endpoint.url, &endpoint.token)?;
            Ok(Arc::new(client) as Arc<dyn SchedulerClient>)
        });
        Self::new(cache, default_area, factory)
    }

    pub fn default_area(&self) -> &str {
        &self.default_area
    }

    /// Maps an area to its RPC client, constructing and caching one on first
    /// use. An area without a registered endpoint falls back to the default
    /// area; a missing default is a hard error.
    pub async fn resolve(&self, area_id: &str) -> Result<Arc<dyn SchedulerClient>, PoolError> {
        let mut area = if area_id.is_empty() {
            self.default_area.clone()
        } else {
            area_id.to_string()
        };

        // At most one fallback hop: requested area, then the default.
        for _ in 0..2 {
            if let Some(client) = self.clients.get(&area) {
                return Ok(client.clone());
            }

            match self.endpoint_config(&area).await? {
                Some(endpoint) => {
                    let built = (self.factory)(&endpoint)?;
                    // Concurrent resolvers may race here; the map keeps a
                    // single winner and the losers adopt it.
                    let client = self
                        .clients
                        .entry(area.clone())
                        .or_insert(built)
                        .value()
                        .clone();
                    return Ok(client);
                }
                None if area != self.default_area => {
                    tracing::debug!(requested = %area, "no endpoint config, falling back to default area");
                    area = self.default_area.clone();
                }
                None => break,
            }
        }

        tracing::error!(area = %area_id, "no scheduler found");
        Err(PoolError::NoScheduler)
    }

    async fn endpoint_config(&self, area: &str) -> Result<Option<AreaEndpoint>, PoolError> {
        let Some(raw) = self.cache.get(&sched_cfg_key(area)).await? else {
            return Ok(None);
        };
        let endpoints: Vec<AreaEndpoint> = serde_json::from_str(&raw)
            .map_err(|e| CacheError(format!("bad endpoint config for {area}: {e}")))?;
        Ok(endpoints.into_iter().next())
    }

    /// Every area with a registered endpoint, default area first.
    pub async fn known_areas(&self) -> Result<Vec<String>, PoolError> {
        let mut areas: Vec<String> = match self.cache.get(SCHED_AREAS_KEY).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|e| CacheError(format!("bad area index: {e}")))?,
            None => Vec::new(),
        };
        areas.retain(|a| a != &self.default_area);
        areas.insert(0, self.default_area.clone());
        Ok(areas)
    }

    /// Restricts a client-supplied area list to known areas; an empty request
    /// means the default area.
    pub async fn filter_known(&self, requested: &[String]) -> Result<Vec<String>, PoolError> {
        if requested.is_empty() {
            return Ok(vec![self.default_area.clone()]);
        }
        let known = self.known_areas().await?;
        Ok(requested
            .iter()
            .filter(|a| known.contains(a))
            .cloned()
            .collect())
    }

    /// Concurrently removes an asset from every given area.
    ///
    /// A task counts as succeeded when the asset is verifiably gone from its
    /// area: the RPC removed it, the scheduler never had the hash, or other
    /// users still hold the asset there so only this user's mapping goes.
    /// Failed areas are logged and left out; the caller decides what a
    /// partial result means for the database.
    pub async fn remove_asset_fanout(
        self: Arc<Self>,
        db: &Db,
        cid: &str,
        hash: &str,
        areas: &[String],
    ) -> FanoutOutcome {
        let mut tasks = JoinSet::new();

        for area in areas {
            let pool = Arc::clone(&self);
            let db = db.clone();
            let cid = cid.to_string();
            let hash = hash.to_string();
            let area = area.clone();

            tasks.spawn(async move {
                match db.is_only_holder(&hash, &area).await {
                    // Shared copy: the area keeps its replica.
                    Ok(false) => return Some(area),
                    Ok(true) => {}
                    Err(e) => {
                        tracing::error!(area = %area, "holder check failed: {e}");
                        return None;
                    }
                }

                let client = match pool.resolve(&area).await {
                    Ok(client) => client,
                    Err(e) => {
                        tracing::error!(area = %area, "resolve scheduler: {e}");
                        return None;
                    }
                };

                match client.remove_asset(&cid).await {
                    Ok(()) => Some(area),
                    Err(e) if e.is_hash_not_found() => Some(area),
                    Err(e) => {
                        tracing::error!(area = %area, cid = %cid, "remove asset: {e}");
                        None
                    }
                }
            });
        }

        let mut succeeded = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(area)) => succeeded.push(area),
                Ok(None) => {}
                Err(e) => tracing::error!("fan-out task failed: {e}"),
            }
        }

        FanoutOutcome {
            succeeded,
            requested: areas.len(),
        }
    }

    /// Moves a node between areas: detach from the source, attach to the
    /// target, then clean up the source. Sequential; the first failure aborts
    /// so a half-moved node is never cleaned up.
    pub async fn migrate_node(
        &self,
        node_id: &str,
        from_area: &str,
        to_area: &str,
    ) -> Result<(), PoolError> {
        let source = self.resolve(from_area).await?;
        let bundle = source.migrate_node_out(node_id).await?;

        let target = self.resolve(to_area).await?;
        target.migrate_node_in(&bundle).await?;

        source.cleanup_node(node_id, &bundle.key).await?;
        tracing::info!(node = %node_id, from = %from_area, to = %to_area, "node migrated");
        Ok(())
    }

    /// Counts distinct replica-holding nodes across areas, split into
    /// candidate and edge nodes. Nodes replicating assets in several areas
    /// are counted once.
    pub async fn count_replicas(
        self: Arc<Self>,
        area_cids: HashMap<String, Vec<String>>,
    ) -> ReplicaCounts {
        let candidates = Arc::new(AtomicI64::new(0));
        let edges = Arc::new(AtomicI64::new(0));
        let seen: Arc<DashSet<String>> = Arc::new(DashSet::new());
        let areas = area_cids.len();

        let mut tasks = JoinSet::new();
        for (area, cids) in area_cids {
            let pool = Arc::clone(&self);
            let candidates = Arc::clone(&candidates);
            let edges = Arc::clone(&edges);
            let seen = Arc::clone(&seen);

            tasks.spawn(async move {
                let client = match pool.resolve(&area).await {
                    Ok(client) => client,
                    Err(e) => {
                        tracing::error!(area = %area, "resolve scheduler: {e}");
                        return;
                    }
                };

                for cid in cids {
                    let record = match client.asset_record(&cid).await {
                        Ok(record) => record,
                        Err(e) => {
                            tracing::error!(area = %area, cid = %cid, "asset record: {e}");
                            continue;
                        }
                    };
                    for replica in record.replicas {
                        if !seen.insert(replica.node_id.clone()) {
                            continue;
                        }
                        if replica.is_candidate {
                            candidates.fetch_add(1, Ordering::Relaxed);
                        } else {
                            edges.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            });
        }

        while tasks.join_next().await.is_some() {}

        ReplicaCounts {
            areas,
            candidates: candidates.load(Ordering::Relaxed),
            edges: edges.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use adapters::errors::{Result as AdapterResult, RPC_HASH_NOT_FOUND};
    use adapters::models::*;

    use crate::cache::MemoryCache;
    use crate::database::models::NewAsset;

    /// Behaviors a test area's scheduler can exhibit on `remove_asset`.
    #[derive(Debug, Clone, Copy)]
    enum RemoveBehavior {
        Ok,
        HashNotFound,
        ConnectionError,
    }

    #[derive(Debug)]
    struct MockScheduler {
        remove: RemoveBehavior,
        remove_calls: Arc<AtomicUsize>,
        replicas: Vec<ReplicaInfo>,
    }

    impl MockScheduler {
        fn new(remove: RemoveBehavior) -> Self {
            Self {
                remove,
                remove_calls: Arc::new(AtomicUsize::new(0)),
                replicas: Vec::new(),
            }
        }

        fn with_replicas(replicas: Vec<ReplicaInfo>) -> Self {
            Self {
                remove: RemoveBehavior::Ok,
                remove_calls: Arc::new(AtomicUsize::new(0)),
                replicas,
            }
        }
    }

    fn unimplemented_err<T>() -> AdapterResult<T> {
        Err(AdapterError::Connection("not wired in this test".into()))
    }

    #[async_trait]
    impl SchedulerClient for MockScheduler {
        async fn create_asset(&self, _: &CreateAssetRequest) -> AdapterResult<CreateAssetOutcome> {
            unimplemented_err()
        }

        async fn remove_asset(&self, _cid: &str) -> AdapterResult<()> {
            self.remove_calls.fetch_add(1, Ordering::SeqCst);
            match self.remove {
                RemoveBehavior::Ok => Ok(()),
                RemoveBehavior::HashNotFound => Err(AdapterError::Rpc {
                    code: RPC_HASH_NOT_FOUND,
                    message: "hash not found".into(),
                }),
                RemoveBehavior::ConnectionError => {
                    Err(AdapterError::Connection("connection refused".into()))
                }
            }
        }

        async fn share_assets(
            &self,
            _: &str,
            _: &[String],
            _: Option<DateTime<Utc>>,
        ) -> AdapterResult<std::collections::HashMap<String, Vec<String>>> {
            unimplemented_err()
        }

        async fn share_encrypted_asset(
            &self,
            _: &str,
            _: &str,
            _: &str,
            _: Option<DateTime<Utc>>,
        ) -> AdapterResult<Vec<String>> {
            unimplemented_err()
        }

        async fn asset_record(&self, cid: &str) -> AdapterResult<AssetRecord> {
            Ok(AssetRecord {
                cid: cid.to_string(),
                total_size: 0,
                replicas: self.replicas.clone(),
            })
        }

        async fn node_upload_info(&self, _: &str, _: &str, _: bool) -> AdapterResult<NodeUploadInfo> {
            unimplemented_err()
        }

        async fn node_public_key(&self, _: &str) -> AdapterResult<String> {
            unimplemented_err()
        }

        async fn node_snapshot(&self, _: &str) -> AdapterResult<NodeSnapshot> {
            unimplemented_err()
        }

        async fn replica_events(&self, _: &str, _: i64, _: i64) -> AdapterResult<Page<ReplicaEvent>> {
            unimplemented_err()
        }

        async fn validation_results(
            &self,
            _: &str,
            _: i64,
            _: i64,
        ) -> AdapterResult<Page<ValidationResult>> {
            unimplemented_err()
        }

        async fn profit_details(
            &self,
            _: &str,
            _: i64,
            _: i64,
            _: &[i64],
        ) -> AdapterResult<Page<ProfitDetail>> {
            unimplemented_err()
        }

        async fn migrate_node_out(&self, node_id: &str) -> AdapterResult<MigrationBundle> {
            Ok(MigrationBundle {
                node_id: node_id.to_string(),
                key: "handover".into(),
                payload: serde_json::Value::Null,
            })
        }

        async fn migrate_node_in(&self, _: &MigrationBundle) -> AdapterResult<()> {
            Ok(())
        }

        async fn cleanup_node(&self, _: &str, _: &str) -> AdapterResult<()> {
            Ok(())
        }
    }

    struct Fixture {
        pool: Arc<SchedulerPool>,
        cache: Arc<MemoryCache>,
        mocks: Arc<DashMap<String, Arc<MockScheduler>>>,
        factory_calls: Arc<AtomicUsize>,
    }

    const DEFAULT_AREA: &str = "area-default";

    async fn fixture(mocks: Vec<(&str, MockScheduler)>) -> Fixture {
        let cache = Arc::new(MemoryCache::new());
        let registry: Arc<DashMap<String, Arc<MockScheduler>>> = Arc::new(DashMap::new());
        let factory_calls = Arc::new(AtomicUsize::new(0));

        let mut areas = Vec::new();
        for (area, mock) in mocks {
            registry.insert(area.to_string(), Arc::new(mock));
            let cfg = serde_json::to_string(&vec![AreaEndpoint {
                url: format!("https://{area}.example.com/rpc/v0"),
                token: "token".into(),
            }])
            .unwrap();
            cache
                .set_ex(&sched_cfg_key(area), &cfg, Duration::from_secs(600))
                .await
                .unwrap();
            areas.push(area.to_string());
        }
        cache
            .set_ex(
                SCHED_AREAS_KEY,
                &serde_json::to_string(&areas).unwrap(),
                Duration::from_secs(600),
            )
            .await
            .unwrap();

        let registry_for_factory = Arc::clone(&registry);
        let calls = Arc::clone(&factory_calls);
        let factory: SchedulerFactory = Arc::new(move |endpoint: &AreaEndpoint| {
            calls.fetch_add(1, Ordering::SeqCst);
            // url is https://{area}.example.com/rpc/v0
            let area = endpoint
                .url
                .trim_start_matches("https://")
                .split('.')
                .next()
                .unwrap()
                .to_string();
            let mock = registry_for_factory
                .get(&area)
                .ok_or_else(|| AdapterError::Connection(format!("unknown area {area}")))?;
            Ok(mock.value().clone() as Arc<dyn SchedulerClient>)
        });

        let pool = Arc::new(SchedulerPool::new(
            cache.clone() as Arc<dyn Cache>,
            DEFAULT_AREA.to_string(),
            factory,
        ));

        Fixture {
            pool,
            cache,
            mocks: registry,
            factory_calls,
        }
    }

    #[tokio::test]
    async fn resolve_constructs_once_per_area() {
        let fx = fixture(vec![(DEFAULT_AREA, MockScheduler::new(RemoveBehavior::Ok))]).await;

        fx.pool.resolve(DEFAULT_AREA).await.unwrap();
        fx.pool.resolve(DEFAULT_AREA).await.unwrap();
        fx.pool.resolve("").await.unwrap();

        assert_eq!(fx.factory_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_area_falls_back_to_default() {
        let fx = fixture(vec![(DEFAULT_AREA, MockScheduler::new(RemoveBehavior::Ok))]).await;

        let client = fx.pool.resolve("area-nowhere").await.unwrap();
        client.remove_asset("cid-1").await.unwrap();

        let default_mock = fx.mocks.get(DEFAULT_AREA).unwrap();
        assert_eq!(default_mock.remove_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_default_config_is_an_error() {
        let fx = fixture(vec![]).await;
        // No configs registered at all.
        fx.cache.del(SCHED_AREAS_KEY).await.unwrap();

        let err = fx.pool.resolve("area-nowhere").await.unwrap_err();
        assert!(matches!(err, PoolError::NoScheduler));
    }

    #[tokio::test]
    async fn fanout_aggregates_partial_successes() {
        let fx = fixture(vec![
            ("area-ok", MockScheduler::new(RemoveBehavior::Ok)),
            ("area-gone", MockScheduler::new(RemoveBehavior::HashNotFound)),
            ("area-down", MockScheduler::new(RemoveBehavior::ConnectionError)),
        ])
        .await;

        let db = Db::connect_memory().await.unwrap();
        let areas: Vec<String> = vec!["area-ok".into(), "area-gone".into(), "area-down".into()];

        let outcome = fx
            .pool
            .remove_asset_fanout(&db, "cid-1", "hash-1", &areas)
            .await;

        let mut succeeded = outcome.succeeded.clone();
        succeeded.sort();
        assert_eq!(succeeded, vec!["area-gone".to_string(), "area-ok".to_string()]);
        assert!(outcome.is_partial());
    }

    #[tokio::test]
    async fn fanout_skips_rpc_for_shared_copies() {
        let fx = fixture(vec![("area-shared", MockScheduler::new(RemoveBehavior::Ok))]).await;

        let db = Db::connect_memory().await.unwrap();
        for user in ["a@x.io", "b@x.io"] {
            db.add_asset(
                &NewAsset {
                    user_id: user.into(),
                    hash: "hash-1".into(),
                    cid: "cid-1".into(),
                    ..Default::default()
                },
                &["area-shared".into()],
            )
            .await
            .unwrap();
        }

        let outcome = fx
            .pool
            .remove_asset_fanout(&db, "cid-1", "hash-1", &["area-shared".into()])
            .await;

        assert_eq!(outcome.succeeded, vec!["area-shared".to_string()]);
        assert!(!outcome.is_partial());
        let mock = fx.mocks.get("area-shared").unwrap();
        assert_eq!(
            mock.remove_calls.load(Ordering::SeqCst),
            0,
            "shared copies must not be removed from the area"
        );
    }

    #[tokio::test]
    async fn replica_counts_dedupe_nodes_across_areas() {
        let replica = |node: &str, candidate: bool| ReplicaInfo {
            node_id: node.into(),
            status: REPLICA_STATUS_SUCCEEDED,
            is_candidate: candidate,
            done_size: 0,
        };

        let fx = fixture(vec![
            (
                "area-1",
                MockScheduler::with_replicas(vec![replica("n1", true), replica("n2", false)]),
            ),
            (
                "area-2",
                MockScheduler::with_replicas(vec![replica("n2", false), replica("n3", false)]),
            ),
        ])
        .await;

        let mut area_cids = HashMap::new();
        area_cids.insert("area-1".to_string(), vec!["cid-1".to_string()]);
        area_cids.insert("area-2".to_string(), vec!["cid-1".to_string()]);

        let counts = fx.pool.count_replicas(area_cids).await;
        assert_eq!(counts.areas, 2);
        assert_eq!(counts.candidates, 1);
        assert_eq!(counts.edges, 2, "n2 is counted once");
    }

    #[tokio::test]
    async fn known_areas_lead_with_default() {
        let fx = fixture(vec![
            ("area-b", MockScheduler::new(RemoveBehavior::Ok)),
            (DEFAULT_AREA, MockScheduler::new(RemoveBehavior::Ok)),
        ])
        .await;

        let areas = fx.pool.known_areas().await.unwrap();
        assert_eq!(areas[0], DEFAULT_AREA);
        assert!(areas.contains(&"area-b".to_string()));

        let filtered = fx
            .pool
            .filter_known(&["area-b".into(), "area-fake".into()])
            .await
            .unwrap();
        assert_eq!(filtered, vec!["area-b".to_string()]);

        let defaulted = fx.pool.filter_known(&[]).await.unwrap();
        assert_eq!(defaulted, vec![DEFAULT_AREA.to_string()]);
    }
}
