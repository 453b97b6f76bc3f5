//! Logging setup: `compact` or `json` output behind an `EnvFilter`.
//!
//! `FX_LOG_LEVEL` (default `info`) and `FX_LOG_FORMAT` (`compact` | `json`)
//! supply the defaults; `--log-level` / `--log-format` override them.

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Supported log output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable compact format
    Compact,
    /// Machine-readable JSON format
    Json,
}

impl LogFormat {
    fn parse(s: &str) -> Self {
        match s {
            "json" => Self::Json,
            _ => Self::Compact,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// `EnvFilter` directive, e.g. `info` or `info,fx_rt=debug`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Compact,
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self::from_values(
            std::env::var("FX_LOG_LEVEL").ok(),
            std::env::var("FX_LOG_FORMAT").ok(),
        )
    }

    pub fn from_values(level: Option<String>, format: Option<String>) -> Self {
        let mut cfg = Self::default();
        if let Some(level) = level.filter(|l| !l.trim().is_empty()) {
            cfg.level = level;
        }
        if let Some(format) = format {
            cfg.format = LogFormat::parse(&format);
        }
        cfg
    }

    /// CLI values win over whatever is already set.
    #[must_use]
    pub fn with_overrides(self, level: Option<String>, format: Option<String>) -> Self {
        let over = Self::from_values(level.clone(), format.clone());
        Self {
            level: if level.is_some() { over.level } else { self.level },
            format: if format.is_some() { over.format } else { self.format },
        }
    }
}

/// Install the global subscriber. Fails if one is already installed or the
/// level directive does not parse.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_new(&config.level)
        .map_err(|e| anyhow::anyhow!("invalid log level {:?}: {e}", config.level))?;

    let fmt_layer = match config.format {
        LogFormat::Json => fmt::layer().json().with_target(true).boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(env_filter))
        .try_init()
        .map_err(|e| anyhow::anyhow!("logging already initialized: {e}"))?;

    tracing::info!(format = ?config.format, level = %config.level, "Logging system initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_fall_back_to_defaults() {
        let cfg = LoggingConfig::from_values(None, None);
        assert_eq!(cfg, LoggingConfig::default());

        let cfg = LoggingConfig::from_values(Some("  ".into()), Some("yaml".into()));
        assert_eq!(cfg.level, "info");
        assert_eq!(cfg.format, LogFormat::Compact);
    }

    #[test]
    fn overrides_replace_only_given_fields() {
        let base = LoggingConfig::from_values(Some("debug".into()), Some("json".into()));
        let cfg = base.clone().with_overrides(None, Some("compact".into()));
        assert_eq!(cfg.level, "debug");
        assert_eq!(cfg.format, LogFormat::Compact);

        let cfg = base.with_overrides(Some("warn,fx_rt=trace".into()), None);
        assert_eq!(cfg.level, "warn,fx_rt=trace");
        assert_eq!(cfg.format, LogFormat::Json);
    }
}
