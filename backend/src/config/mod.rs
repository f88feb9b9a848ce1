//! Central module for application-wide configuration settings.
//!
//! This module handles loading and managing configuration parameters such as
//! the listen address, database and cache URLs, the default scheduler area,
//! and token/callback secrets. Values come from a TOML file with environment
//! variable overrides for deployment.

use std::path::Path;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub scheduler: SchedulerConfig,
    pub auth: AuthConfig,
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub listen: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Redis connection URL. When absent the process runs on the in-memory
    /// cache, which is only suitable for a single node.
    #[serde(default)]
    pub redis_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    pub default_area: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub token_secret: String,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub callback_secret: String,
}

fn default_token_ttl_hours() -> i64 {
    72
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("read config {}: {e}", path.as_ref().display()))?;
        let mut config: Config =
            toml::from_str(&content).map_err(|e| anyhow::anyhow!("parse config: {e}"))?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Environment overrides so deployments do not have to template the file.
    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("PORTAL_LISTEN") {
            self.server.listen = v;
        }
        if let Ok(v) = std::env::var("PORTAL_DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = std::env::var("PORTAL_REDIS_URL") {
            self.cache.redis_url = Some(v);
        }
        if let Ok(v) = std::env::var("PORTAL_TOKEN_SECRET") {
            self.auth.token_secret = v;
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.server.listen.is_empty() {
            anyhow::bail!("server.listen cannot be empty");
        }
        if self.database.url.is_empty() {
            anyhow::bail!("database.url cannot be empty");
        }
        if self.scheduler.default_area.is_empty() {
            anyhow::bail!("scheduler.default_area cannot be empty");
        }
        if self.auth.token_secret.is_empty() {
            anyhow::bail!("auth.token_secret cannot be empty");
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                listen: "0.0.0.0:8080".into(),
            },
            database: DatabaseConfig {
                url: "sqlite://portal.db".into(),
            },
            cache: CacheConfig { redis_url: None },
            scheduler: SchedulerConfig {
                default_area: "Asia-HongKong".into(),
            },
            auth: AuthConfig {
                token_secret: "dev-only-secret".into(),
                token_ttl_hours: default_token_ttl_hours(),
            },
            notify: NotifyConfig {
                enabled: false,
                callback_secret: String::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_file() {
        let raw = r#"
            [server]
            listen = "127.0.0.1:9000"

            [database]
            url = "sqlite://test.db"

            [cache]
            redis_url = "redis://127.0.0.1/0"

            [scheduler]
            default_area = "Asia-HongKong"

            [auth]
            token_secret = "s3cret"

            [notify]
            enabled = true
            callback_secret = "cb"
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:9000");
        assert_eq!(config.cache.redis_url.as_deref(), Some("redis://127.0.0.1/0"));
        assert_eq!(config.auth.token_ttl_hours, 72);
        assert!(config.notify.enabled);
    }
}
