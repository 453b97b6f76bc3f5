//! Process-level families, rendered in every scrape.

use fx_common::Filter;
use prometheus::core::Collector;
use prometheus::{CounterVec, GaugeVec, IntGauge, Opts};

pub struct ExporterMetrics {
    /// Never filtered.
    pub build_info: GaugeVec,
    /// labels: result = success | error
    pub service_refresh_total: CounterVec,
    pub discovered_services: IntGauge,
}

impl ExporterMetrics {
    pub(crate) fn new(namespace: &str, subsystem: &str, version: &str) -> Result<Self, prometheus::Error> {
        let opts = |name: &str, help: &str| Opts::new(name, help).namespace(namespace).subsystem(subsystem);
        let build_info = GaugeVec::new(
            Opts::new("exporter_build_info", "Build information about the exporter.").namespace(namespace),
            &["version"],
        )?;
        build_info.with_label_values(&[version]).set(1.0);

        Ok(Self {
            build_info,
            service_refresh_total: CounterVec::new(
                opts("service_refresh_total", "Service list refreshes by result."),
                &["result"],
            )?,
            discovered_services: IntGauge::with_opts(opts(
                "discovered_services",
                "Number of services currently being polled.",
            ))?,
        })
    }

    pub(crate) fn register(
        &self,
        registry: &prometheus::Registry,
        filter: &Filter,
    ) -> Result<(), prometheus::Error> {
        registry.register(Box::new(self.build_info.clone()))?;
        let rest: [Box<dyn Collector>; 2] = [
            Box::new(self.service_refresh_total.clone()),
            Box::new(self.discovered_services.clone()),
        ];
        for c in rest {
            if c.desc().iter().all(|d| filter.permit(&d.fq_name)) {
                registry.register(c)?;
            }
        }
        Ok(())
    }

    pub fn refresh_succeeded(&self) {
        self.service_refresh_total.with_label_values(&["success"]).inc();
    }

    pub fn refresh_failed(&self) {
        self.service_refresh_total.with_label_values(&["error"]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_info_survives_block_all() {
        let m = ExporterMetrics::new("fastly", "rt", "1.2.3").unwrap();
        let mut filter = Filter::new();
        filter.block(".*").unwrap();
        let r = prometheus::Registry::new();
        m.register(&r, &filter).unwrap();
        m.refresh_succeeded();
        m.discovered_services.set(4);

        let names: Vec<String> = r.gather().iter().map(|mf| mf.get_name().to_string()).collect();
        assert_eq!(names, vec!["fastly_exporter_build_info".to_string()]);
    }
}
