pub mod cache;
pub mod request_store;
pub mod score_index;

mod macros;

pub use cache::create_redis_client;
pub use cache::Cache;
pub use cache::CacheKey;
pub use request_store::RedisRequestStore;
pub use score_index::RedisScoreIndex;
