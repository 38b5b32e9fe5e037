use chrono::{DateTime, Duration, Utc};
use redis::AsyncCommands;
use std::collections::HashSet;

use crate::{
    db::{Cache, CacheKey, RequestStore},
    error::AppResult,
    services::progression::ProgressionResult,
};

/// Request bookkeeping on top of the Redis cache
#[derive(Clone)]
pub struct RedisRequestStore {
    cache: Cache,
    pending_ttl: u64,
    progression_ttl: u64,
    retention: Duration,
}

impl RedisRequestStore {
    pub fn new(cache: Cache, pending_ttl: u64, progression_ttl: u64, retention_days: i64) -> Self {
        Self {
            cache,
            pending_ttl,
            progression_ttl,
            retention: Duration::days(retention_days),
        }
    }
}

#[async_trait::async_trait]
impl RequestStore for RedisRequestStore {
    async fn mark_pending(&self, request_id: &str, username: &str) -> AppResult<()> {
        let mut conn = self.cache.connection().await?;
        let key = CacheKey::Pending(request_id.to_string());
        let _: () = conn.set_ex(key.to_string(), username, self.pending_ttl).await?;
        Ok(())
    }

    async fn clear_pending(&self, request_id: &str) -> AppResult<()> {
        let mut conn = self.cache.connection().await?;
        let _: () = conn.del(CacheKey::Pending(request_id.to_string()).to_string()).await?;
        Ok(())
    }

    async fn cached_progression(&self, user_id: u64) -> AppResult<Option<ProgressionResult>> {
        self.cache.get_from_cache(&CacheKey::Progression(user_id)).await
    }

    async fn store_progression(&self, user_id: u64, progression: &ProgressionResult) {
        self.cache
            .set_in_background(&CacheKey::Progression(user_id), progression, self.progression_ttl);
    }

    async fn recent_suggestions(&self, user_id: u64, since: DateTime<Utc>) -> AppResult<HashSet<u32>> {
        let mut conn = self.cache.connection().await?;
        let members: Vec<u32> = conn
            .zrangebyscore(CacheKey::Suggested(user_id).to_string(), since.timestamp(), "+inf")
            .await?;
        Ok(members.into_iter().collect())
    }

    async fn record_suggestion(&self, user_id: u64, beatmap_id: u32, at: DateTime<Utc>) -> AppResult<()> {
        let mut conn = self.cache.connection().await?;
        let key = CacheKey::Suggested(user_id).to_string();
        let horizon = (at - self.retention).timestamp();

        let _: () = redis::pipe()
            .atomic()
            .zadd(&key, beatmap_id, at.timestamp())
            .ignore()
            .zrembyscore(&key, "-inf", format!("({}", horizon))
            .ignore()
            .expire(&key, self.retention.num_seconds())
            .ignore()
            .query_async(&mut conn)
            .await?;

        tracing::debug!(user_id, beatmap_id, "Suggestion recorded");
        Ok(())
    }
}
