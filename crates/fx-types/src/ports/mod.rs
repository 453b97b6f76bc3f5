//! Ports (traits) consumed by the discovery cache and the realtime poller.
//!
//! `fx-api` provides the reqwest-backed implementations; tests inject fakes.

pub mod realtime;
pub mod services;

pub use realtime::RealtimeSource;
pub use services::ServicePager;
