//! Domain services. Each owns a handle to the pool; none caches results.

pub mod accounts;
pub mod analytics;
pub mod catalog;
pub mod export;
pub mod lifecycle;
pub mod orders;
pub mod tracking;
