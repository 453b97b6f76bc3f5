//! The metric set owned by one service.
//!
//! Every family is built for every service so the poller never has to check
//! the metric-name filter; only permitted families are registered, and only
//! registered families are exposed.

use fx_common::Filter;
use parking_lot::Mutex;
use prometheus::core::Collector;
use prometheus::{CounterVec, GaugeVec, Opts};

pub const LABEL_SERVICE_ID: &str = "service_id";
pub const LABEL_SERVICE_NAME: &str = "service_name";
pub const LABEL_DATACENTER: &str = "datacenter";

const DC_LABELS: &[&str] = &[LABEL_SERVICE_ID, LABEL_SERVICE_NAME, LABEL_DATACENTER];

#[derive(Debug, Clone, PartialEq, Eq)]
struct Info {
    name: String,
    version: i64,
}

pub struct ServiceMetrics {
    service_id: String,

    // labels: service_id, service_name, datacenter
    pub requests_total: CounterVec,
    pub hits_total: CounterVec,
    pub miss_total: CounterVec,
    pub pass_total: CounterVec,
    pub errors_total: CounterVec,
    pub synth_total: CounterVec,
    pub hits_time_total: CounterVec,
    pub miss_time_total: CounterVec,
    pub req_header_bytes_total: CounterVec,
    pub req_body_bytes_total: CounterVec,
    pub resp_header_bytes_total: CounterVec,
    pub resp_body_bytes_total: CounterVec,
    pub bereq_header_bytes_total: CounterVec,
    pub bereq_body_bytes_total: CounterVec,
    /// + status_group = 1xx..5xx
    pub status_group_total: CounterVec,
    /// + status_code = 200, 503, ...
    pub status_code_total: CounterVec,

    /// labels: service_id, service_name, result
    pub realtime_api_requests_total: CounterVec,
    /// labels: service_id, service_name; UNIX seconds
    pub last_successful_response: GaugeVec,
    /// labels: service_id, service_name, service_version
    pub service_info: GaugeVec,

    info: Mutex<Option<Info>>,
}

impl ServiceMetrics {
    pub(crate) fn new(service_id: &str, namespace: &str, subsystem: &str) -> Result<Self, prometheus::Error> {
        let opts = |name: &str, help: &str| Opts::new(name, help).namespace(namespace).subsystem(subsystem);
        let counter = |name: &str, help: &str| CounterVec::new(opts(name, help), DC_LABELS);
        let with_extra = |name: &str, help: &str, extra: &str| {
            CounterVec::new(
                opts(name, help),
                &[LABEL_SERVICE_ID, LABEL_SERVICE_NAME, LABEL_DATACENTER, extra],
            )
        };

        Ok(Self {
            service_id: service_id.to_string(),
            requests_total: counter("requests_total", "Total number of requests.")?,
            hits_total: counter("hits_total", "Number of cache hits.")?,
            miss_total: counter("miss_total", "Number of cache misses.")?,
            pass_total: counter("pass_total", "Number of requests that passed through the cache.")?,
            errors_total: counter("errors_total", "Number of cache errors.")?,
            synth_total: counter("synth_total", "Number of synthetic responses.")?,
            hits_time_total: counter("hits_time_total", "Total amount of time spent processing cache hits (seconds).")?,
            miss_time_total: counter("miss_time_total", "Total amount of time spent processing cache misses (seconds).")?,
            req_header_bytes_total: counter("req_header_bytes_total", "Total header bytes received.")?,
            req_body_bytes_total: counter("req_body_bytes_total", "Total body bytes received.")?,
            resp_header_bytes_total: counter("resp_header_bytes_total", "Total header bytes delivered.")?,
            resp_body_bytes_total: counter("resp_body_bytes_total", "Total body bytes delivered.")?,
            bereq_header_bytes_total: counter("bereq_header_bytes_total", "Total header bytes sent to origin.")?,
            bereq_body_bytes_total: counter("bereq_body_bytes_total", "Total body bytes sent to origin.")?,
            status_group_total: with_extra("status_group_total", "Number of responses by status group.", "status_group")?,
            status_code_total: with_extra("status_code_total", "Number of responses by status code.", "status_code")?,
            realtime_api_requests_total: CounterVec::new(
                opts("realtime_api_requests_total", "Total requests made to the realtime stats API."),
                &[LABEL_SERVICE_ID, LABEL_SERVICE_NAME, "result"],
            )?,
            last_successful_response: GaugeVec::new(
                opts("last_successful_response", "UNIX timestamp of the last successful realtime API response."),
                &[LABEL_SERVICE_ID, LABEL_SERVICE_NAME],
            )?,
            service_info: GaugeVec::new(
                opts("service_info", "Static gauge with service ID, name, and active version."),
                &[LABEL_SERVICE_ID, LABEL_SERVICE_NAME, "service_version"],
            )?,
            info: Mutex::new(None),
        })
    }

    fn collectors(&self) -> Vec<Box<dyn Collector>> {
        let counters = [
            &self.requests_total,
            &self.hits_total,
            &self.miss_total,
            &self.pass_total,
            &self.errors_total,
            &self.synth_total,
            &self.hits_time_total,
            &self.miss_time_total,
            &self.req_header_bytes_total,
            &self.req_body_bytes_total,
            &self.resp_header_bytes_total,
            &self.resp_body_bytes_total,
            &self.bereq_header_bytes_total,
            &self.bereq_body_bytes_total,
            &self.status_group_total,
            &self.status_code_total,
            &self.realtime_api_requests_total,
        ];
        let mut out: Vec<Box<dyn Collector>> = counters
            .into_iter()
            .map(|c| Box::new(c.clone()) as Box<dyn Collector>)
            .collect();
        out.push(Box::new(self.last_successful_response.clone()));
        out.push(Box::new(self.service_info.clone()));
        out
    }

    /// Register every family whose fully-qualified name passes `filter`.
    pub(crate) fn register(
        &self,
        registry: &prometheus::Registry,
        filter: &Filter,
    ) -> Result<(), prometheus::Error> {
        for c in self.collectors() {
            let permitted = c.desc().iter().all(|d| filter.permit(&d.fq_name));
            if permitted {
                registry.register(c)?;
            }
        }
        Ok(())
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    /// Last name passed to [`Self::observe_info`].
    pub fn service_name(&self) -> Option<String> {
        self.info.lock().as_ref().map(|i| i.name.clone())
    }

    /// Point `service_info` at the current name and version, dropping the
    /// previous series when either changed.
    pub fn observe_info(&self, name: &str, version: i64) {
        let mut cur = self.info.lock();
        let next = Info {
            name: name.to_string(),
            version,
        };
        if cur.as_ref() == Some(&next) {
            return;
        }
        if let Some(prev) = cur.take() {
            let prev_version = prev.version.to_string();
            let _ = self
                .service_info
                .remove_label_values(&[&self.service_id, &prev.name, &prev_version]);
        }
        let version = version.to_string();
        self.service_info
            .with_label_values(&[&self.service_id, name, &version])
            .set(1.0);
        *cur = Some(next);
    }
}
