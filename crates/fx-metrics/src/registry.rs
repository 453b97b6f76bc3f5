//! Per-service registries, created on first use and rendered together.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use fx_common::Filter;
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, TextEncoder};

use crate::error::MetricsError;
use crate::exporter::ExporterMetrics;
use crate::service_metrics::ServiceMetrics;

struct ServiceEntry {
    registry: prometheus::Registry,
    metrics: Arc<ServiceMetrics>,
}

pub struct Registry {
    namespace: String,
    subsystem: String,
    metric_filter: Filter,
    exporter_registry: prometheus::Registry,
    exporter: ExporterMetrics,
    services: DashMap<String, Arc<ServiceEntry>>,
}

impl Registry {
    /// Fails if `namespace`/`subsystem` do not form valid metric names.
    pub fn new(
        version: &str,
        namespace: &str,
        subsystem: &str,
        metric_filter: Filter,
    ) -> Result<Self, MetricsError> {
        ServiceMetrics::new("", namespace, subsystem)?;

        let exporter_registry = prometheus::Registry::new();
        let exporter = ExporterMetrics::new(namespace, subsystem, version)?;
        exporter.register(&exporter_registry, &metric_filter)?;

        Ok(Self {
            namespace: namespace.to_string(),
            subsystem: subsystem.to_string(),
            metric_filter,
            exporter_registry,
            exporter,
            services: DashMap::new(),
        })
    }

    pub fn exporter(&self) -> &ExporterMetrics {
        &self.exporter
    }

    /// Metric set for `service_id`, created and registered on first call.
    /// Concurrent callers for the same ID get the same set.
    pub fn metrics_for(&self, service_id: &str) -> Result<Arc<ServiceMetrics>, MetricsError> {
        if let Some(e) = self.services.get(service_id) {
            return Ok(e.metrics.clone());
        }
        match self.services.entry(service_id.to_string()) {
            Entry::Occupied(o) => Ok(o.get().metrics.clone()),
            Entry::Vacant(v) => {
                let metrics = Arc::new(ServiceMetrics::new(service_id, &self.namespace, &self.subsystem)?);
                let registry = prometheus::Registry::new();
                metrics.register(&registry, &self.metric_filter)?;
                v.insert(Arc::new(ServiceEntry {
                    registry,
                    metrics: metrics.clone(),
                }));
                Ok(metrics)
            }
        }
    }

    /// IDs that have a metric set, sorted.
    pub fn service_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.services.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// `(id, name)` pairs, sorted by ID. The name is empty until the
    /// service's info has been observed.
    pub fn services(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = self
            .services
            .iter()
            .map(|e| (e.key().clone(), e.metrics.service_name().unwrap_or_default()))
            .collect();
        out.sort();
        out
    }

    fn entries(&self, target: Option<&str>) -> Vec<Arc<ServiceEntry>> {
        match target {
            Some(id) => self.services.get(id).map(|e| e.value().clone()).into_iter().collect(),
            None => {
                let mut all: Vec<(String, Arc<ServiceEntry>)> = self
                    .services
                    .iter()
                    .map(|e| (e.key().clone(), e.value().clone()))
                    .collect();
                all.sort_by(|a, b| a.0.cmp(&b.0));
                all.into_iter().map(|(_, e)| e).collect()
            }
        }
    }

    /// Exporter families plus every service (or only `target`), with
    /// same-named families merged across services.
    pub fn gather(&self, target: Option<&str>) -> Vec<MetricFamily> {
        let mut families = self.exporter_registry.gather();
        for entry in self.entries(target) {
            families.extend(entry.registry.gather());
        }
        merge(families)
    }

    /// Prometheus text exposition of [`Self::gather`].
    pub fn render(&self, target: Option<&str>) -> Result<Vec<u8>, MetricsError> {
        let families = self.gather(target);
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&families, &mut buf)
            .map_err(|e| MetricsError::Encode(e.to_string()))?;
        Ok(buf)
    }
}

fn merge(families: Vec<MetricFamily>) -> Vec<MetricFamily> {
    let mut by_name: BTreeMap<String, MetricFamily> = BTreeMap::new();
    for mut mf in families {
        match by_name.get_mut(mf.get_name()) {
            Some(existing) => {
                for m in mf.take_metric() {
                    existing.mut_metric().push(m);
                }
            }
            None => {
                by_name.insert(mf.get_name().to_string(), mf);
            }
        }
    }
    by_name
        .into_values()
        .map(|mut mf| {
            mf.mut_metric().sort_by(|a, b| {
                let ka = a.get_label().iter().map(|l| l.get_value());
                let kb = b.get_label().iter().map(|l| l.get_value());
                ka.cmp(kb)
            });
            mf
        })
        .collect()
}
