//! Cache module - weakly-owned entity storage.
//!
//! ## Architecture
//!
//! - `WeakTable` - keyed kinds, one slot per id holding a weak handle
//! - `WeakList` - scan kinds (roles, reactions, games) searched by predicate
//! - `EntityCache` - one table per kind plus the fetch-on-miss path
//!
//! A cached entity lives only as long as someone outside the cache holds
//! it, unless `CacheConfig` enables the Moka retention tier.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let cache = EntityCache::new(http, &CacheConfig::default());
//!
//! // Fetches on a miss, shares the instance afterwards
//! let user = cache.user("1234")?;
//!
//! // Event payloads merge into the live instance
//! cache.user_with("1234", &payload)?;
//! ```

mod config;
mod scan;
mod storage;
mod weak;

pub use config::CacheConfig;
pub use scan::WeakList;
pub use storage::EntityCache;
pub use weak::WeakTable;
