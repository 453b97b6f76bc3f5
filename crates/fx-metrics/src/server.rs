//! HTTP listener for the registry.

use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hyper::server::conn::Http;
use hyper::service::service_fn;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::registry::Registry;

const LOG_INTERVAL: Duration = Duration::from_secs(30);

/// Logs at most once per [`LOG_INTERVAL`] per error kind.
struct ErrorRateLimiter {
    accept_errors: AtomicU64,
    connection_errors: AtomicU64,
    last_accept_log: Mutex<Option<Instant>>,
    last_connection_log: Mutex<Option<Instant>>,
}

impl ErrorRateLimiter {
    fn new() -> Self {
        Self {
            accept_errors: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            last_accept_log: Mutex::new(None),
            last_connection_log: Mutex::new(None),
        }
    }

    fn due(last: &Mutex<Option<Instant>>) -> bool {
        // contended: another task is logging
        let Some(mut last) = last.try_lock() else {
            return false;
        };
        if last.map_or(true, |t| t.elapsed() >= LOG_INTERVAL) {
            *last = Some(Instant::now());
            true
        } else {
            false
        }
    }

    fn log_accept_error(&self, e: &dyn std::fmt::Display) {
        let count = self.accept_errors.fetch_add(1, Ordering::Relaxed) + 1;
        if Self::due(&self.last_accept_log) {
            warn!(error=%e, count=%count, "metrics accept failed (rate limited)");
            self.accept_errors.store(0, Ordering::Relaxed);
        }
    }

    fn log_connection_error(&self, e: &dyn std::fmt::Display) {
        let count = self.connection_errors.fetch_add(1, Ordering::Relaxed) + 1;
        if Self::due(&self.last_connection_log) {
            warn!(error=%e, count=%count, "metrics serve_connection error (rate limited)");
            self.connection_errors.store(0, Ordering::Relaxed);
        }
    }
}

/// Serve `registry` on `listener` until `cancel` fires.
pub async fn serve(listener: TcpListener, registry: Arc<Registry>, cancel: CancellationToken) {
    let errors = Arc::new(ErrorRateLimiter::new());
    info!(addr=?listener.local_addr().ok(), "metrics listener ready");
    loop {
        let (stream, peer) = tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(x) => x,
                Err(e) => {
                    errors.log_accept_error(&e);
                    // fd exhaustion would otherwise spin
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    continue;
                }
            },
        };
        let registry = registry.clone();
        let errors = errors.clone();
        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let registry = registry.clone();
                async move { Ok::<_, Infallible>(registry.handle(&req)) }
            });
            if let Err(e) = Http::new().serve_connection(stream, svc).await {
                debug!(%peer, "connection closed with error");
                errors.log_connection_error(&e);
            }
        });
    }
    info!("metrics listener stopped");
}
