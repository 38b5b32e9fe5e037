use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::error::AppResult;
use crate::services::progression::ProgressionResult;

pub mod redis;

pub use redis::create_redis_client;
pub use redis::Cache;
pub use redis::CacheKey;
pub use redis::RedisRequestStore;
pub use redis::RedisScoreIndex;

/// Per-player bookkeeping around recommendation requests
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RequestStore: Send + Sync {
    /// Flags a request as in flight for operators; expires on its own
    async fn mark_pending(&self, request_id: &str, username: &str) -> AppResult<()>;

    async fn clear_pending(&self, request_id: &str) -> AppResult<()>;

    async fn cached_progression(&self, user_id: u64) -> AppResult<Option<ProgressionResult>>;

    /// Best effort; failures are logged
    async fn store_progression(&self, user_id: u64, progression: &ProgressionResult);

    /// Charts suggested to the player at or after `since`
    async fn recent_suggestions(&self, user_id: u64, since: DateTime<Utc>) -> AppResult<HashSet<u32>>;

    async fn record_suggestion(&self, user_id: u64, beatmap_id: u32, at: DateTime<Utc>) -> AppResult<()>;
}
