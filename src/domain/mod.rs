//! Domain layer: entity records and shared value types.

pub mod entities;
pub mod types;
