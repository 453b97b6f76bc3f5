use async_trait::async_trait;

use crate::{ApiError, RealtimeResponse};

/// Long-polls the realtime stats channel of a single service.
///
/// `ts` is `0` on the first call and the previous response's `timestamp`
/// afterwards.
#[async_trait]
pub trait RealtimeSource: Send + Sync {
    async fn fetch(&self, service_id: &str, ts: u64) -> Result<RealtimeResponse, ApiError>;
}
