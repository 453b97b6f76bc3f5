//! fx-api: service discovery against the listing API.
//!
//! - `shard`: deterministic N-of-M partition of service IDs.
//! - `service_cache`: paginated fetch + filtering + copy-on-write snapshot.
//! - `http` / `realtime`: reqwest implementations of the `fx-types` ports.

pub mod http;
pub mod realtime;
pub mod service_cache;
pub mod shard;

pub use http::HttpServicePager;
pub use realtime::HttpRealtimeClient;
pub use service_cache::{ServiceCache, ServiceCacheConfig};
pub use shard::{Shard, ShardError};

/// Header carrying the API token on every request.
pub const TOKEN_HEADER: &str = "Fastly-Key";
