use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;

pub const DEFAULT_FANOUT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Postgres,
}

impl StorageBackend {
    fn parse(value: &str) -> Result<Self> {
        match value {
            "memory" => Ok(StorageBackend::Memory),
            "postgres" => Ok(StorageBackend::Postgres),
            other => bail!("unknown storage backend: {other}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    /// Pool acquire timeout; an unreachable database fails calls instead of
    /// hanging them.
    pub acquire_timeout_ms: u64,
}

// Service configuration sourced from environment variables, with an optional
// YAML override file.
#[derive(Debug, Clone)]
pub struct SetlistConfig {
    pub bind_addr: SocketAddr,
    pub metrics_bind: SocketAddr,
    pub storage: StorageBackend,
    pub postgres: Option<PostgresConfig>,
    pub fanout_capacity: usize,
    /// Shared secret for the support provisioning surface. When unset the
    /// support routes reject every caller.
    pub support_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SetlistConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    storage: Option<String>,
    postgres_url: Option<String>,
    fanout_capacity: Option<usize>,
    support_token: Option<String>,
}

impl SetlistConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = std::env::var("SETLIST_BIND")
            .unwrap_or_else(|_| "0.0.0.0:8443".to_string())
            .parse()
            .with_context(|| "parse SETLIST_BIND")?;
        let metrics_bind = std::env::var("SETLIST_METRICS_BIND")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .with_context(|| "parse SETLIST_METRICS_BIND")?;
        let storage = StorageBackend::parse(
            &std::env::var("SETLIST_STORAGE").unwrap_or_else(|_| "memory".to_string()),
        )?;
        let postgres = match std::env::var("SETLIST_PG_URL") {
            Ok(url) => Some(PostgresConfig {
                url,
                max_connections: env_u32("SETLIST_PG_MAX_CONNECTIONS", 16)?,
                acquire_timeout_ms: env_u64("SETLIST_PG_ACQUIRE_TIMEOUT_MS", 2_000)?,
            }),
            Err(_) => None,
        };
        if storage == StorageBackend::Postgres && postgres.is_none() {
            bail!("SETLIST_STORAGE=postgres requires SETLIST_PG_URL");
        }
        let fanout_capacity = match std::env::var("SETLIST_FANOUT_CAPACITY") {
            Ok(value) => value
                .parse()
                .with_context(|| "parse SETLIST_FANOUT_CAPACITY")?,
            Err(_) => DEFAULT_FANOUT_CAPACITY,
        };
        let support_token = std::env::var("SETLIST_SUPPORT_TOKEN").ok();
        Ok(Self {
            bind_addr,
            metrics_bind,
            storage,
            postgres,
            fanout_capacity,
            support_token,
        })
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("SETLIST_CONFIG") {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read SETLIST_CONFIG: {path}"))?;
            let override_cfg: SetlistConfigOverride =
                serde_yaml::from_str(&contents).with_context(|| "parse setlist config yaml")?;
            if let Some(value) = override_cfg.bind_addr {
                config.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
            }
            if let Some(value) = override_cfg.metrics_bind {
                config.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
            }
            if let Some(value) = override_cfg.storage {
                config.storage = StorageBackend::parse(&value)?;
            }
            if let Some(url) = override_cfg.postgres_url {
                config.postgres = Some(match config.postgres.take() {
                    Some(pg) => PostgresConfig { url, ..pg },
                    None => PostgresConfig {
                        url,
                        max_connections: 16,
                        acquire_timeout_ms: 2_000,
                    },
                });
            }
            if let Some(value) = override_cfg.fanout_capacity {
                config.fanout_capacity = value;
            }
            if let Some(value) = override_cfg.support_token {
                config.support_token = Some(value);
            }
            if config.storage == StorageBackend::Postgres && config.postgres.is_none() {
                bail!("storage=postgres requires postgres_url");
            }
        }
        Ok(config)
    }
}

fn env_u32(name: &str, default: u32) -> Result<u32> {
    match std::env::var(name) {
        Ok(value) => value.parse().with_context(|| format!("parse {name}")),
        Err(_) => Ok(default),
    }
}

fn env_u64(name: &str, default: u64) -> Result<u64> {
    match std::env::var(name) {
        Ok(value) => value.parse().with_context(|| format!("parse {name}")),
        Err(_) => Ok(default),
    }
}
