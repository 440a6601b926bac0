//! Metrics for the uasp installer.
//!
//! Metric calls go through the `metrics` crate facade and are no-ops until a
//! recorder is installed. With the `prometheus` feature, [`init_metrics`]
//! installs a Prometheus recorder whose snapshot can be rendered on demand.
//!
//! ```rust,ignore
//! use uasp_metrics::{counter, installer};
//!
//! counter!(installer::REMOVE_TOTAL).increment(1);
//! ```

mod definitions;
mod recorder;

pub use {
    definitions::*,
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

// Re-export metrics macros for convenience
pub use metrics::{counter, histogram};
