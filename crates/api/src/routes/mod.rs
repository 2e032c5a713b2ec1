//! HTTP route handlers.

pub mod groups;
pub mod health;
pub mod join;
pub mod metrics;
