use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fx_api::{ServiceCache, ServiceCacheConfig};
use fx_common::Filter;
use fx_metrics::Registry;
use fx_rt::{Manager, Subscriber};
use fx_types::{ApiError, RealtimeResponse, RealtimeSource, Service, ServicePage, ServicePager};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Single-page listing whose contents tests can swap.
#[derive(Default)]
struct Listing(Mutex<Vec<Service>>);

impl Listing {
    fn set(&self, services: &[(&str, &str, i64)]) {
        *self.0.lock() = services
            .iter()
            .map(|(id, name, v)| Service::new(*id, *name, *v))
            .collect();
    }
}

#[async_trait]
impl ServicePager for Listing {
    async fn fetch_page(&self, _token: Option<&str>) -> Result<ServicePage, ApiError> {
        Ok(ServicePage {
            services: self.0.lock().clone(),
            next: None,
        })
    }
}

/// Replays `script` in order, then blocks like an idle long poll.
struct Scripted {
    script: Mutex<Vec<Result<RealtimeResponse, ApiError>>>,
    seen_ts: Mutex<Vec<u64>>,
    calls: AtomicUsize,
}

impl Scripted {
    fn new(mut script: Vec<Result<RealtimeResponse, ApiError>>) -> Self {
        script.reverse();
        Self {
            script: Mutex::new(script),
            seen_ts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RealtimeSource for Scripted {
    async fn fetch(&self, _service_id: &str, ts: u64) -> Result<RealtimeResponse, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_ts.lock().push(ts);
        let next = self.script.lock().pop();
        match next {
            Some(r) => r,
            None => std::future::pending().await,
        }
    }
}

fn payload(ts: u64, requests: u64, error: &str) -> RealtimeResponse {
    let body = serde_json::json!({
        "Timestamp": ts,
        "Error": error,
        "Data": [{"recorded": ts - 1, "datacenter": {"NYC": {"requests": requests}}}],
    });
    RealtimeResponse::from_json(body.to_string().as_bytes()).unwrap()
}

async fn cache_with(services: &[(&str, &str, i64)]) -> (Arc<Listing>, Arc<ServiceCache>) {
    let listing = Arc::new(Listing::default());
    listing.set(services);
    let cache = Arc::new(ServiceCache::new(ServiceCacheConfig::new(listing.clone())));
    cache.refresh(&CancellationToken::new()).await.unwrap();
    (listing, cache)
}

fn registry() -> Arc<Registry> {
    Arc::new(Registry::new("test", "fastly", "rt", Filter::new()).unwrap())
}

async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn subscriber_chains_timestamps_and_counts() {
    let (_, cache) = cache_with(&[("AAA", "Service One", 1)]).await;
    let registry = registry();
    let metrics = registry.metrics_for("AAA").unwrap();
    let source = Arc::new(Scripted::new(vec![
        Ok(payload(101, 3, "")),
        Ok(payload(102, 4, "")),
        Ok(payload(103, 0, "No data available")),
    ]));

    let cancel = CancellationToken::new();
    let sub = Subscriber::new("AAA", source.clone(), cache, metrics.clone(), Duration::from_millis(5));
    let task = tokio::spawn(sub.run(cancel.clone()));

    eventually(|| source.calls.load(Ordering::SeqCst) >= 4).await;
    cancel.cancel();
    task.await.unwrap();

    assert_eq!(*source.seen_ts.lock(), vec![0, 101, 102, 103]);
    let req = metrics
        .requests_total
        .with_label_values(&["AAA", "Service One", "NYC"])
        .get();
    assert_eq!(req, 7.0);
    let results = |r: &str| {
        metrics
            .realtime_api_requests_total
            .with_label_values(&["AAA", "Service One", r])
            .get()
    };
    assert_eq!(results("success"), 2.0);
    assert_eq!(results("no data"), 1.0);
    assert!(
        metrics
            .last_successful_response
            .with_label_values(&["AAA", "Service One"])
            .get()
            > 0.0
    );
}

#[tokio::test]
async fn subscriber_backs_off_after_errors() {
    let (_, cache) = cache_with(&[("AAA", "Service One", 1)]).await;
    let registry = registry();
    let metrics = registry.metrics_for("AAA").unwrap();
    let source = Arc::new(Scripted::new(vec![
        Err(ApiError::Transport("connection reset".into())),
        Ok(payload(200, 1, "")),
    ]));

    let cancel = CancellationToken::new();
    let sub = Subscriber::new("AAA", source.clone(), cache, metrics.clone(), Duration::from_millis(5));
    let task = tokio::spawn(sub.run(cancel.clone()));

    eventually(|| source.calls.load(Ordering::SeqCst) >= 3).await;
    cancel.cancel();
    task.await.unwrap();

    // failed request leaves the cursor where it was
    assert_eq!(*source.seen_ts.lock(), vec![0, 0, 200]);
    let results = |r: &str| {
        metrics
            .realtime_api_requests_total
            .with_label_values(&["AAA", "Service One", r])
            .get()
    };
    assert_eq!(results("error"), 1.0);
    assert_eq!(results("success"), 1.0);
}

#[tokio::test]
async fn subscriber_exits_on_cancel_while_polling() {
    let (_, cache) = cache_with(&[("AAA", "Service One", 1)]).await;
    let registry = registry();
    let source = Arc::new(Scripted::new(Vec::new()));
    let cancel = CancellationToken::new();
    let sub = Subscriber::new(
        "AAA",
        source.clone(),
        cache,
        registry.metrics_for("AAA").unwrap(),
        Duration::from_secs(1),
    );
    let task = tokio::spawn(sub.run(cancel.clone()));

    eventually(|| source.calls.load(Ordering::SeqCst) == 1).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("subscriber did not stop")
        .unwrap();
}

#[tokio::test]
async fn manager_follows_discovery() {
    let (listing, cache) = cache_with(&[("AAA", "Service One", 1), ("BBB", "Service Two", 2)]).await;
    let registry = registry();
    let source = Arc::new(Scripted::new(Vec::new()));
    let manager = Manager::new(
        cache.clone(),
        registry.clone(),
        source,
        Duration::from_millis(5),
        CancellationToken::new(),
    );

    manager.refresh().unwrap();
    assert_eq!(manager.running_ids(), vec!["AAA", "BBB"]);
    assert_eq!(registry.exporter().discovered_services.get(), 2);
    assert_eq!(
        registry.services(),
        vec![
            ("AAA".to_string(), "Service One".to_string()),
            ("BBB".to_string(), "Service Two".to_string()),
        ]
    );

    listing.set(&[("AAA", "Service One", 3)]);
    cache.refresh(&CancellationToken::new()).await.unwrap();
    manager.refresh().unwrap();
    assert_eq!(manager.running_ids(), vec!["AAA"]);
    assert_eq!(registry.exporter().discovered_services.get(), 1);
    // stopped services stay exposed
    assert_eq!(registry.service_ids(), vec!["AAA", "BBB"]);

    let body = String::from_utf8(registry.render(Some("AAA")).unwrap()).unwrap();
    assert!(body.contains(r#"service_version="3""#));
    assert!(!body.contains(r#"service_version="1""#));

    manager.stop_all().await;
    assert!(manager.running_ids().is_empty());
    assert_eq!(registry.exporter().discovered_services.get(), 0);
}
