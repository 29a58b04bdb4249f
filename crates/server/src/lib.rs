//! HTTP surface and background scheduling for the Encore service.

pub mod api;
pub mod metrics;
pub mod scheduler;
pub mod state;
