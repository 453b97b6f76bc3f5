//! fx-metrics: per-service Prometheus registries behind one HTTP surface.
//! - `Registry::metrics_for` lazily creates one metric set (and one
//!   `prometheus::Registry`) per service ID.
//! - `GET /metrics` renders every service; `GET /metrics?target=<id>` renders
//!   one. `GET /sd` and `GET /` list the known services.
//! - `server::serve` is the hyper accept loop.

pub mod error;
pub mod exporter;
pub mod http;
pub mod registry;
pub mod server;
pub mod service_metrics;

pub use error::MetricsError;
pub use exporter::ExporterMetrics;
pub use registry::Registry;
pub use service_metrics::ServiceMetrics;
