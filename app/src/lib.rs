//! fastly-exporter: wiring for the binary.
//! - `cli`: flags.
//! - `config`: validated configuration built from the flags.
//! - `logging`: tracing-subscriber setup.
//! - `run`: startup, periodic refresh, shutdown.

pub mod cli;
pub mod config;
pub mod logging;
pub mod run;
