//! Keeps the set of running subscribers equal to the discovered services.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use fx_api::ServiceCache;
use fx_metrics::{MetricsError, Registry};
use fx_types::RealtimeSource;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::subscriber::Subscriber;

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct Manager {
    cache: Arc<ServiceCache>,
    registry: Arc<Registry>,
    source: Arc<dyn RealtimeSource>,
    backoff: Duration,
    cancel: CancellationToken,
    running: Mutex<HashMap<String, Running>>,
}

impl Manager {
    /// Subscribers inherit `cancel`, so cancelling it stops every one of them.
    pub fn new(
        cache: Arc<ServiceCache>,
        registry: Arc<Registry>,
        source: Arc<dyn RealtimeSource>,
        backoff: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            cache,
            registry,
            source,
            backoff,
            cancel,
            running: Mutex::new(HashMap::new()),
        }
    }

    /// Diff the cache against running subscribers: start new IDs, stop
    /// vanished ones. Stopped services keep their series. Must be called
    /// inside a tokio runtime.
    pub fn refresh(&self) -> Result<(), MetricsError> {
        let ids = self.cache.service_ids();
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut running = self.running.lock();

        running.retain(|id, r| {
            let keep = wanted.contains(id.as_str());
            if !keep {
                info!(service_id=%id, "service gone, stopping subscriber");
                r.cancel.cancel();
            }
            keep
        });

        for id in &ids {
            let metrics = self.registry.metrics_for(id)?;
            if let Some((name, version)) = self.cache.metadata(id) {
                metrics.observe_info(&name, version);
            }
            if running.contains_key(id) {
                continue;
            }
            info!(service_id=%id, "service discovered, starting subscriber");
            let cancel = self.cancel.child_token();
            let subscriber = Subscriber::new(
                id.clone(),
                self.source.clone(),
                self.cache.clone(),
                metrics,
                self.backoff,
            );
            let handle = tokio::spawn(subscriber.run(cancel.clone()));
            running.insert(id.clone(), Running { cancel, handle });
        }

        self.registry
            .exporter()
            .discovered_services
            .set(running.len() as i64);
        Ok(())
    }

    /// IDs with a live subscriber, sorted.
    pub fn running_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.running.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Cancel every subscriber and wait for them to exit.
    pub async fn stop_all(&self) {
        let drained: Vec<(String, Running)> = self.running.lock().drain().collect();
        for (_, r) in &drained {
            r.cancel.cancel();
        }
        for (id, r) in drained {
            if let Err(e) = r.handle.await {
                warn!(service_id=%id, error=%e, "subscriber task failed");
            }
        }
        self.registry.exporter().discovered_services.set(0);
    }
}
