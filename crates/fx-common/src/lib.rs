//! fx-common: helpers shared by discovery and metrics.

pub mod filter;

pub use filter::{Filter, FilterError};
