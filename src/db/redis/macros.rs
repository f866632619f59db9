/// Cache-aside read-through for a `CacheStore`.
///
/// Checks the cache for `$key` first and returns the deserialized value on a
/// hit. On a miss it awaits `$block`, writes a successful result back with
/// `$ttl`, and returns it. Cache failures in either direction are logged and
/// never fail the caller; only an error from `$block` is propagated.
///
/// # Arguments
/// * `$cache`: a smart pointer or reference to a `dyn CacheStore`.
/// * `$key`: the `CacheKey` to read and write.
/// * `$ttl`: a `std::time::Duration` for the written entry.
/// * `$block`: a future resolving to `AppResult<T>` where `T` is serde round-trippable.
///
/// # Example
/// ```rust,ignore
/// let response = cached!(self.cache, key, CACHE_TTL, async {
///     compute_expensive_value().await
/// })?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        match $crate::db::redis::cache::read_json(&*$cache, &$key).await {
            Ok(Some(cached)) => {
                ::tracing::debug!(key = %$key, "Cache hit");
                Ok(cached)
            }
            lookup => {
                match lookup {
                    Err(e) => ::tracing::warn!(key = %$key, error = %e, "Cache read failed, recomputing"),
                    _ => ::tracing::debug!(key = %$key, "Cache miss"),
                }

                match $block.await {
                    Ok(value) => {
                        if let Err(e) =
                            $crate::db::redis::cache::write_json(&*$cache, &$key, &value, $ttl).await
                        {
                            ::tracing::warn!(key = %$key, error = %e, "Cache write failed");
                        }
                        Ok(value)
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }};
}
