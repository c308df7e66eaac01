//! Wiring and lifecycle of the running service.

pub mod order_system;

pub use order_framework::tracing::{setup_tracing, LogFormat};
pub use order_system::{build_service, OrderSystem, StartupError};
