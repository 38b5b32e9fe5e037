use serde::Deserialize;

use crate::models::Discipline;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Redis connection URL (score index, caches and markers)
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Game API base URL
    #[serde(default = "default_game_api_url")]
    pub game_api_url: String,

    /// Game API bearer token
    pub game_api_token: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Sorted set holding the community score index
    #[serde(default = "default_score_index_key")]
    pub score_index_key: String,

    /// Rows scanned per script invocation when paginating
    #[serde(default = "default_index_chunk_size")]
    pub index_chunk_size: usize,

    /// Upper bound on accepted candidates per query
    #[serde(default = "default_index_max_results")]
    pub index_max_results: usize,

    /// Use chunked pagination instead of a single scan
    #[serde(default = "default_true")]
    pub index_paginated: bool,

    #[serde(default = "default_profile_cache_ttl")]
    pub profile_cache_ttl: u64,

    #[serde(default = "default_chart_cache_ttl")]
    pub chart_cache_ttl: u64,

    #[serde(default = "default_progression_cache_ttl")]
    pub progression_cache_ttl: u64,

    /// TTL of the operator-facing "request in flight" marker
    #[serde(default = "default_pending_marker_ttl")]
    pub pending_marker_ttl: u64,

    /// Charts suggested within this many days are not suggested again
    #[serde(default = "default_suggestion_retention_days")]
    pub suggestion_retention_days: i64,

    /// Wall-clock budget for a single worker
    #[serde(default = "default_worker_timeout_secs")]
    pub worker_timeout_secs: u64,

    #[serde(default = "default_primary_discipline")]
    pub primary_discipline: String,

    #[serde(default = "default_primary_discipline_weight")]
    pub primary_discipline_weight: f64,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_game_api_url() -> String {
    "https://osu.ppy.sh/api/v2".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_score_index_key() -> String {
    "scores:index".to_string()
}

fn default_index_chunk_size() -> usize {
    1000
}

fn default_index_max_results() -> usize {
    50_000
}

fn default_true() -> bool {
    true
}

fn default_profile_cache_ttl() -> u64 {
    600
}

fn default_chart_cache_ttl() -> u64 {
    86400 // 1 day in seconds
}

fn default_progression_cache_ttl() -> u64 {
    300
}

fn default_pending_marker_ttl() -> u64 {
    120
}

fn default_suggestion_retention_days() -> i64 {
    7
}

fn default_worker_timeout_secs() -> u64 {
    60
}

fn default_primary_discipline() -> String {
    "osu".to_string()
}

fn default_primary_discipline_weight() -> f64 {
    1.2
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = envy::from_env::<Config>()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Parsed primary discipline used to weight the global progression score
    pub fn primary_discipline(&self) -> anyhow::Result<Discipline> {
        self.primary_discipline
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid PRIMARY_DISCIPLINE: {}", e))
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.index_chunk_size == 0 {
            anyhow::bail!("INDEX_CHUNK_SIZE must be greater than zero");
        }
        if self.index_max_results == 0 {
            anyhow::bail!("INDEX_MAX_RESULTS must be greater than zero");
        }
        if !self.primary_discipline_weight.is_finite() || self.primary_discipline_weight <= 0.0 {
            anyhow::bail!("PRIMARY_DISCIPLINE_WEIGHT must be a positive number");
        }
        self.primary_discipline()?;
        Ok(())
    }
}
