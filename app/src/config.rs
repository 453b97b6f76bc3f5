//! Flag validation. Everything that can be rejected before touching the
//! network is rejected here.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use fx_api::Shard;
use fx_common::Filter;

use crate::cli::Args;
use crate::logging::LoggingConfig;

#[derive(Debug, Clone)]
pub struct ExporterConfig {
    pub token: String,
    pub listen: SocketAddr,
    pub namespace: String,
    pub subsystem: String,
    pub service_ids: Vec<String>,
    pub service_filter: Filter,
    pub metric_filter: Filter,
    pub shard: Shard,
    pub api_refresh: Duration,
    pub api_timeout: Duration,
    pub rt_timeout: Duration,
    pub rt_backoff: Duration,
    pub api_base: String,
    pub rt_base: String,
    pub logging: LoggingConfig,
}

impl ExporterConfig {
    pub fn from_args(args: Args) -> Result<Self> {
        let token = args.token.trim().to_string();
        if token.is_empty() {
            bail!("--token must not be empty");
        }

        let service_filter = Filter::from_patterns(&args.service_allowlist, &args.service_blocklist)
            .context("invalid --service-allowlist/--service-blocklist")?;
        let metric_filter = Filter::from_patterns(&args.metric_allowlist, &args.metric_blocklist)
            .context("invalid --metric-allowlist/--metric-blocklist")?;

        let shard = match args.service_shard.as_deref() {
            Some(s) => Shard::parse(s).context("invalid --service-shard")?,
            None => Shard::default(),
        };

        for (flag, d) in [
            ("--api-refresh", args.api_refresh),
            ("--api-timeout", args.api_timeout),
            ("--rt-timeout", args.rt_timeout),
        ] {
            if d.is_zero() {
                bail!("{flag} must be greater than zero");
            }
        }

        for (flag, base) in [("--api-base", &args.api_base), ("--rt-base", &args.rt_base)] {
            let url = url::Url::parse(base).with_context(|| format!("invalid {flag} {base:?}"))?;
            if !matches!(url.scheme(), "http" | "https") {
                bail!("{flag} must be an http(s) URL, got {base:?}");
            }
        }

        let logging = LoggingConfig::from_env().with_overrides(args.log_level, args.log_format);

        Ok(Self {
            token,
            listen: args.listen,
            namespace: args.namespace,
            subsystem: args.subsystem,
            service_ids: args.services,
            service_filter,
            metric_filter,
            shard,
            api_refresh: args.api_refresh,
            api_timeout: args.api_timeout,
            rt_timeout: args.rt_timeout,
            rt_backoff: args.rt_backoff,
            api_base: args.api_base,
            rt_base: args.rt_base,
            logging,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(extra: &[&str]) -> Result<ExporterConfig> {
        let mut argv = vec!["fastly-exporter", "--token", "secret"];
        argv.extend_from_slice(extra);
        ExporterConfig::from_args(Args::try_parse_from(argv)?)
    }

    #[test]
    fn builds_filters_and_shard() {
        let cfg = parse(&[
            "--service-allowlist",
            "^prod",
            "--service-blocklist",
            "canary",
            "--metric-blocklist",
            "bytes",
            "--service-shard",
            " 2 / 3 ",
        ])
        .unwrap();
        assert!(cfg.service_filter.permit("prod-www"));
        assert!(!cfg.service_filter.permit("prod-canary"));
        assert!(!cfg.service_filter.permit("staging"));
        assert!(!cfg.metric_filter.permit("fastly_rt_resp_body_bytes_total"));
        assert_eq!(cfg.shard.to_string(), "2/3");
    }

    #[test]
    fn unsharded_by_default() {
        let cfg = parse(&[]).unwrap();
        assert_eq!(cfg.shard, Shard::default());
        assert!(cfg.service_filter.is_empty());
    }

    #[test]
    fn rejects_invalid_values() {
        let err = parse(&["--service-shard", "3/2"]).unwrap_err();
        assert!(format!("{err:#}").contains("--service-shard"));

        let err = parse(&["--metric-allowlist", "("]).unwrap_err();
        assert!(format!("{err:#}").contains("--metric-allowlist"));

        assert!(parse(&["--api-refresh", "0s"]).is_err());
        assert!(parse(&["--rt-base", "ftp://rt.example"]).is_err());
        assert!(ExporterConfig::from_args(
            Args::try_parse_from(["fastly-exporter", "--token", "  "]).unwrap()
        )
        .is_err());
    }
}
