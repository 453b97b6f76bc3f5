//! Startup, periodic service refresh, and shutdown.
//!
//! `args -> config -> logging -> cache/registry/manager -> initial refresh
//! -> listener -> refresh loop -> stop subscribers -> stop listener`

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use fx_api::{HttpRealtimeClient, HttpServicePager, ServiceCache, ServiceCacheConfig};
use fx_metrics::Registry;
use fx_rt::Manager;
use tokio::net::TcpListener;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ExporterConfig;

pub async fn run(config: ExporterConfig) -> Result<()> {
    info!(
        listen = %config.listen,
        shard = %config.shard,
        services = config.service_ids.len(),
        "starting fastly-exporter {}",
        env!("CARGO_PKG_VERSION")
    );

    let pager = HttpServicePager::new(&config.api_base, config.token.clone(), config.api_timeout)
        .context("building service API client")?;
    let realtime = HttpRealtimeClient::new(&config.rt_base, config.token.clone(), config.rt_timeout)
        .context("building realtime API client")?;

    let cache = Arc::new(ServiceCache::new(
        ServiceCacheConfig::new(Arc::new(pager))
            .with_ids(config.service_ids.iter().cloned())
            .with_name_filter(config.service_filter.clone())
            .with_shard(config.shard),
    ));
    let registry = Arc::new(
        Registry::new(
            env!("CARGO_PKG_VERSION"),
            &config.namespace,
            &config.subsystem,
            config.metric_filter.clone(),
        )
        .context("invalid --namespace/--subsystem")?,
    );

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    // a bad token or unreachable API should fail fast
    cache
        .refresh(&shutdown)
        .await
        .context("initial service refresh")?;
    registry.exporter().refresh_succeeded();
    info!(services = cache.len(), "initial service refresh complete");

    let manager = Manager::new(
        cache.clone(),
        registry.clone(),
        Arc::new(realtime),
        config.rt_backoff,
        shutdown.child_token(),
    );
    manager.refresh().context("starting subscribers")?;

    let listener = TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("binding {}", config.listen))?;
    let server = tokio::spawn(fx_metrics::server::serve(
        listener,
        registry.clone(),
        shutdown.child_token(),
    ));

    refresh_loop(&cache, &registry, &manager, config.api_refresh, &shutdown).await;

    info!("shutting down");
    shutdown.cancel();
    manager.stop_all().await;
    if let Err(e) = server.await {
        warn!(error=%e, "metrics listener task failed");
    }
    Ok(())
}

/// Refresh the cache every `period` until `shutdown` fires. A failed refresh
/// keeps the previous service list.
pub async fn refresh_loop(
    cache: &ServiceCache,
    registry: &Registry,
    manager: &Manager,
    period: Duration,
    shutdown: &CancellationToken,
) {
    let mut tick = tokio::time::interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately
    tick.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tick.tick() => {}
        }
        match cache.refresh(shutdown).await {
            Ok(()) => {
                registry.exporter().refresh_succeeded();
                debug!(services = cache.len(), "service refresh complete");
                if let Err(e) = manager.refresh() {
                    warn!(error=%e, "updating subscribers failed");
                }
            }
            Err(e) if e.is_cancelled() => break,
            Err(e) => {
                registry.exporter().refresh_failed();
                warn!(error=%e, class=e.class(), "service refresh failed, keeping previous service list");
            }
        }
    }
}

fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            r = tokio::signal::ctrl_c() => {
                if let Err(e) = r {
                    warn!(error=%e, "installing Ctrl-C handler failed");
                    return;
                }
                info!("received Ctrl-C");
            }
            _ = term_signal() => info!("received SIGTERM"),
        }
        shutdown.cancel();
    });
}

#[cfg(unix)]
async fn term_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sig) => {
            sig.recv().await;
        }
        Err(e) => {
            warn!(error=%e, "installing SIGTERM handler failed");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn term_signal() {
    std::future::pending::<()>().await;
}
