/// Read-through lookup against the Redis [`Cache`](crate::db::Cache).
///
/// Returns the cached value for `$key` when present. Otherwise awaits
/// `$block`, queues the result for a background write with a TTL of `$ttl`
/// seconds and returns it. Errors from the cache read or from the block are
/// propagated with `?`, so the caller must return an `AppResult`.
///
/// # Example
/// ```rust,ignore
/// let chart: ChartMetadata = cached!(
///     self.cache,
///     CacheKey::Chart(beatmap_id),
///     self.chart_ttl,
///     async move { self.fetch_chart(beatmap_id).await }
/// )?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        if let Some(hit) = $cache.get_from_cache(&$key).await? {
            Ok(hit)
        } else {
            let fresh = $block.await?;
            $cache.set_in_background(&$key, &fresh, $ttl);
            Ok(fresh)
        }
    }};
}
