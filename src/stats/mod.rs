//! Remuxing statistics

pub mod metrics;

pub use metrics::RemuxStats;
