//! Configuration for the catalog worker

use std::time::Duration;

use core_config::{ConfigError, FromEnv, env_duration_secs, env_parse};
use database::mongodb::MongoConfig;
use domain_catalog::EngineConfig;

const DEFAULT_INGEST_PER_PAGE: u32 = 10;
const DEFAULT_INGEST_INTERVAL_SECS: u64 = 15;

#[derive(Debug, Clone)]
pub struct Config {
    pub mongo: MongoConfig,
    pub engine: EngineConfig,
    pub ingest: IngestConfig,
}

/// Defaults for `ingest` when the flags are omitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    pub per_page: u32,
    /// Pause between consecutive pages
    pub interval: Duration,
    pub max_pages: Option<u32>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            per_page: DEFAULT_INGEST_PER_PAGE,
            interval: Duration::from_secs(DEFAULT_INGEST_INTERVAL_SECS),
            max_pages: None,
        }
    }
}

/// Environment variables:
/// - `INGEST_PER_PAGE` (default 10)
/// - `INGEST_INTERVAL_SECS` (default 15)
/// - `INGEST_MAX_PAGES` (optional, unbounded when unset)
impl FromEnv for IngestConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let max_pages = match std::env::var("INGEST_MAX_PAGES") {
            Ok(_) => Some(env_parse("INGEST_MAX_PAGES", 0u32)?),
            Err(_) => None,
        };

        Ok(Self {
            per_page: env_parse("INGEST_PER_PAGE", DEFAULT_INGEST_PER_PAGE)?,
            interval: env_duration_secs("INGEST_INTERVAL_SECS", DEFAULT_INGEST_INTERVAL_SECS)?,
            max_pages,
        })
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            mongo: MongoConfig::from_env()?.with_app_name("anime-catalog"),
            engine: EngineConfig::from_env()?,
            ingest: IngestConfig::from_env()?,
        })
    }
}
