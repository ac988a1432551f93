/// A macro to simplify get-or-compute caching logic using Redis.
///
/// This macro checks if a value is present in the cache. If found, it
/// returns the cached value. If not found (an unreachable cache also reads
/// as a miss), it executes the provided block to compute the value, stores
/// it in the cache in the background, and then returns the computed value.
///
/// # Arguments
/// * `$cache`: The cache instance to use for retrieval and storage. The cache must have
///   `get_or_miss` and `set_in_background` methods.
/// * `$key`: The key to use for caching the value.
/// * `$ttl`: The time-to-live (TTL) for the cached value in seconds.
/// * `$block`: The future to await if the value is not found in cache; it must
///   resolve to an `AppResult`.
///
/// # Example
/// ```rust,no_run
/// # use localspot_api::cached;
/// # use localspot_api::db::{Cache, CacheKey};
/// # use localspot_api::error::AppResult;
/// # async fn compute_expensive_value() -> AppResult<Vec<String>> { Ok(vec![]) }
/// # async fn example(cache: Cache, cache_key: CacheKey) -> AppResult<Vec<String>> {
/// let payload = cached!(cache, cache_key, 300, async move {
///     // Compute the value if not in cache
///     compute_expensive_value().await
/// });
/// # payload
/// # }
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        // Attempt to get the value from cache
        if let Some(cached) = $cache.get_or_miss(&$key).await {
            Ok(cached)
        } else {
            // If not in cache, execute the block to compute the value
            let value = $block.await?;
            // Store the computed value in cache
            $cache.set_in_background(&$key, &value, $ttl);
            Ok(value)
        }
    }};
}
