//! Telemetry for GPU activity.
//!
//! Every [`DeviceContext`](crate::gpu::DeviceContext) owns a [`Metrics`]
//! collector; with the `telemetry` feature snapshots can be exported.

pub mod metrics;

#[cfg(feature = "telemetry")]
pub mod export;

pub use metrics::{Metrics, MetricsSnapshot};

#[cfg(feature = "telemetry")]
pub use export::{JsonExporter, LogExporter, MetricsExporter};
