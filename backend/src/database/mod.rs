//! Module for database connection setup and common utilities.
//!
//! This module is responsible for initializing the database connection pool,
//! bootstrapping the schema, and providing the `Db` handle the query layer
//! hangs off.

pub mod models;
pub mod queries;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        pass_hash TEXT NOT NULL DEFAULT '',
        user_email TEXT NOT NULL DEFAULT '',
        wallet_address TEXT NOT NULL DEFAULT '',
        role INTEGER NOT NULL DEFAULT 0,
        referrer_user_id TEXT NOT NULL DEFAULT '',
        referrer_code TEXT NOT NULL DEFAULT '',
        total_storage_size INTEGER NOT NULL DEFAULT 0,
        used_storage_size INTEGER NOT NULL DEFAULT 0,
        reward REAL NOT NULL DEFAULT 0,
        referral_reward REAL NOT NULL DEFAULT 0,
        api_keys TEXT NOT NULL DEFAULT '',
        enable_vip INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS referral_codes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        code TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS referral_rewards (
        referrer_user_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        reward REAL NOT NULL DEFAULT 0,
        PRIMARY KEY (referrer_user_id, user_id)
    )",
    "CREATE TABLE IF NOT EXISTS kols (
        user_id TEXT PRIMARY KEY,
        level INTEGER NOT NULL DEFAULT 0,
        status INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS kol_level_confs (
        level INTEGER PRIMARY KEY,
        commission_percent INTEGER NOT NULL DEFAULT 0,
        parent_commission_percent INTEGER NOT NULL DEFAULT 0,
        user_threshold INTEGER NOT NULL DEFAULT 0,
        device_threshold INTEGER NOT NULL DEFAULT 0,
        status INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS user_assets (
        user_id TEXT NOT NULL,
        hash TEXT NOT NULL,
        cid TEXT NOT NULL,
        asset_name TEXT NOT NULL DEFAULT '',
        asset_type TEXT NOT NULL DEFAULT '',
        total_size INTEGER NOT NULL DEFAULT 0,
        password TEXT NOT NULL DEFAULT '',
        group_id INTEGER NOT NULL DEFAULT 0,
        visit_count INTEGER NOT NULL DEFAULT 0,
        share_status INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        PRIMARY KEY (user_id, hash)
    )",
    "CREATE TABLE IF NOT EXISTS user_asset_areas (
        hash TEXT NOT NULL,
        user_id TEXT NOT NULL,
        area_id TEXT NOT NULL,
        is_sync INTEGER NOT NULL DEFAULT 1,
        PRIMARY KEY (hash, user_id, area_id)
    )",
    "CREATE TABLE IF NOT EXISTS asset_groups (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        name TEXT NOT NULL,
        parent INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS device_infos (
        device_id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL DEFAULT '',
        device_name TEXT NOT NULL DEFAULT '',
        bind_status TEXT NOT NULL DEFAULT 'unbinding',
        area_id TEXT NOT NULL DEFAULT '',
        external_ip TEXT NOT NULL DEFAULT '',
        ip_country TEXT NOT NULL DEFAULT '',
        online INTEGER NOT NULL DEFAULT 0,
        system_version TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS device_signatures (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        hash TEXT NOT NULL UNIQUE,
        username TEXT NOT NULL DEFAULT '',
        node_id TEXT NOT NULL,
        area_id TEXT NOT NULL DEFAULT '',
        signature TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS share_links (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL,
        cid TEXT NOT NULL,
        short_link TEXT NOT NULL DEFAULT '',
        long_link TEXT NOT NULL DEFAULT '',
        short_pass TEXT NOT NULL DEFAULT '',
        expire_at TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_asset_areas_hash_area ON user_asset_areas (hash, area_id)",
    "CREATE INDEX IF NOT EXISTS idx_users_referrer ON users (referrer_user_id)",
    "CREATE INDEX IF NOT EXISTS idx_links_cid ON share_links (cid)",
];

#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    /// Connects to the database and bootstraps the schema.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        tracing::info!("connecting to database: {url}");
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        // An in-memory database exists per connection; cap the pool at one so
        // every query sees the same schema.
        let mut pool_options = SqlitePoolOptions::new();
        if url.contains(":memory:") {
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = pool_options.connect_with(options).await?;

        for stmt in SCHEMA {
            sqlx::query(stmt).execute(&pool).await?;
        }

        Ok(Self { pool })
    }

    /// In-memory instance for tests.
    #[cfg(test)]
    pub async fn connect_memory() -> Result<Self, sqlx::Error> {
        Self::connect(":memory:").await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Current wall clock as stored in every timestamp column.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
