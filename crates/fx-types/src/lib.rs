//! fx-types: cross-crate contracts for the exporter.
//!
//! - `Service` / `ServicePage`: records produced by the service listing API.
//! - `realtime`: the payload shape returned by the realtime stats API.
//! - `errors::ApiError`: failure taxonomy shared by every API collaborator.
//! - `ports`: traits the discovery cache and poller consume; concrete HTTP
//!   implementations live in `fx-api`, fakes live in tests.

pub mod errors;
pub mod ports;
pub mod realtime;
pub mod service;

pub use errors::ApiError;
pub use ports::{RealtimeSource, ServicePager};
pub use realtime::{Datum, RealtimeResponse, Stats};
pub use service::{Service, ServicePage};
