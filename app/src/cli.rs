use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "fastly-exporter", version)]
#[command(about = "Prometheus exporter for Fastly realtime stats", long_about = None)]
pub struct Args {
    /// API token
    #[arg(long, env = "FASTLY_API_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Listen address for /, /sd and /metrics
    #[arg(long, default_value = "127.0.0.1:8080", value_parser = parse_addr)]
    pub listen: SocketAddr,

    #[arg(long, default_value = "fastly")]
    pub namespace: String,

    #[arg(long, default_value = "rt")]
    pub subsystem: String,

    /// Only export this service ID (repeatable)
    #[arg(long = "service", value_name = "ID")]
    pub services: Vec<String>,

    /// Only export services whose name matches (repeatable)
    #[arg(long, value_name = "REGEX")]
    pub service_allowlist: Vec<String>,

    /// Skip services whose name matches (repeatable)
    #[arg(long, value_name = "REGEX")]
    pub service_blocklist: Vec<String>,

    /// Only expose metrics whose name matches (repeatable)
    #[arg(long, value_name = "REGEX")]
    pub metric_allowlist: Vec<String>,

    /// Never expose metrics whose name matches (repeatable)
    #[arg(long, value_name = "REGEX")]
    pub metric_blocklist: Vec<String>,

    /// Export only the N-th of M deterministic partitions of services
    #[arg(long, value_name = "N/M")]
    pub service_shard: Option<String>,

    /// Service list refresh interval
    #[arg(long, default_value = "1m", value_parser = humantime::parse_duration)]
    pub api_refresh: Duration,

    /// Timeout for service list requests
    #[arg(long, default_value = "15s", value_parser = humantime::parse_duration)]
    pub api_timeout: Duration,

    /// Timeout for realtime requests (long poll)
    #[arg(long, default_value = "45s", value_parser = humantime::parse_duration)]
    pub rt_timeout: Duration,

    /// Pause after a failed realtime request
    #[arg(long, default_value = "1s", value_parser = humantime::parse_duration)]
    pub rt_backoff: Duration,

    #[arg(long, default_value = "https://api.fastly.com")]
    pub api_base: String,

    #[arg(long, default_value = "https://rt.fastly.com")]
    pub rt_base: String,

    /// Overrides FX_LOG_LEVEL
    #[arg(long)]
    pub log_level: Option<String>,

    /// Overrides FX_LOG_FORMAT
    #[arg(long, value_parser = ["compact", "json"])]
    pub log_format: Option<String>,
}

fn parse_addr(s: &str) -> Result<SocketAddr, String> {
    s.parse().map_err(|e| format!("invalid addr `{s}`: {e}"))
}
