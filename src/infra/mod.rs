//! Infrastructure adapters: the embedded cache store backend, telemetry
//! bootstrap, and the in-memory push-connection registry.

pub mod error;
pub mod memory;
pub mod notify;
pub mod telemetry;
