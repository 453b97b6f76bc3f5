//! fx-rt: realtime stats polling.
//! - `Subscriber` long-polls one service and feeds its `ServiceMetrics`.
//! - `Manager` keeps one subscriber per discovered service.

pub mod manager;
pub mod process;
pub mod subscriber;

pub use manager::Manager;
pub use subscriber::Subscriber;
