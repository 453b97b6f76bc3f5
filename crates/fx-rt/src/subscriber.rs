//! One long-polling loop per service.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fx_api::ServiceCache;
use fx_metrics::ServiceMetrics;
use fx_types::{ApiError, RealtimeSource};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::process::process;

/// Wait after the API rejects the token.
const AUTH_BACKOFF: Duration = Duration::from_secs(60);
/// Marker the API puts in `Error` for an empty but healthy response.
const NO_DATA: &str = "No data available";

pub struct Subscriber {
    service_id: String,
    source: Arc<dyn RealtimeSource>,
    cache: Arc<ServiceCache>,
    metrics: Arc<ServiceMetrics>,
    backoff: Duration,
}

enum Outcome {
    Success,
    NoData,
    Failed(ApiError),
}

impl Outcome {
    fn label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NoData => "no data",
            Self::Failed(_) => "error",
        }
    }
}

impl Subscriber {
    pub fn new(
        service_id: impl Into<String>,
        source: Arc<dyn RealtimeSource>,
        cache: Arc<ServiceCache>,
        metrics: Arc<ServiceMetrics>,
        backoff: Duration,
    ) -> Self {
        Self {
            service_id: service_id.into(),
            source,
            cache,
            metrics,
            backoff,
        }
    }

    /// Poll until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ts = 0u64;
        debug!(service_id=%self.service_id, "subscriber started");
        loop {
            let name = self
                .cache
                .metadata(&self.service_id)
                .map(|(name, _)| name)
                .unwrap_or_else(|| self.service_id.clone());

            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                r = self.source.fetch(&self.service_id, ts) => r,
            };
            let outcome = match fetched {
                Ok(resp) => {
                    if resp.timestamp != 0 {
                        ts = resp.timestamp;
                    }
                    process(&resp, &self.service_id, &name, &self.metrics);
                    if resp.error.is_empty() {
                        Outcome::Success
                    } else if resp.error.contains(NO_DATA) {
                        Outcome::NoData
                    } else {
                        Outcome::Failed(ApiError::Decode(resp.error))
                    }
                }
                Err(e) if e.is_cancelled() => break,
                Err(e) => Outcome::Failed(e),
            };

            self.metrics
                .realtime_api_requests_total
                .with_label_values(&[&self.service_id, &name, outcome.label()])
                .inc();

            let pause = match &outcome {
                Outcome::Success | Outcome::NoData => {
                    self.metrics
                        .last_successful_response
                        .with_label_values(&[&self.service_id, &name])
                        .set(unix_now());
                    continue;
                }
                Outcome::Failed(ApiError::Status { code: 401 | 403, .. }) => AUTH_BACKOFF,
                Outcome::Failed(_) => self.backoff,
            };
            if let Outcome::Failed(e) = &outcome {
                warn!(service_id=%self.service_id, error=%e, backoff=?pause, "realtime fetch failed");
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }
        debug!(service_id=%self.service_id, "subscriber stopped");
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}
