//! Response cache.
//!
//! A single [`ResponseCache`] instance is built at startup and handed to the
//! HTTP layer. Entries expire after `cache.ttl_seconds` or when
//! [`ResponseCache::clear`] is called:
//!
//! ```toml
//! [cache]
//! enabled = true
//! ttl_seconds = 20
//! capacity = 200
//! ```

mod config;
mod lock;
mod middleware;
mod store;

pub use config::CacheConfig;
pub use middleware::response_cache_layer;
pub use store::{CachedResponse, ResponseCache, ResponseKey};
