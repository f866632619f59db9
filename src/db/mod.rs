pub mod postgres;
pub mod redis;

pub use self::postgres::{create_listener, create_pool};
pub use self::redis::create_redis_client;
pub use self::redis::CacheKey;
pub use self::redis::RedisCache;
