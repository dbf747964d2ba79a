//! Application layer: entity service contracts, pagination helpers, and the
//! push-connection registry interface consumed by the notification
//! collaborator.

pub mod notify;
pub mod pagination;
pub mod repos;
