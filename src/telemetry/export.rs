//! Metrics export for offline inspection.

use super::metrics::MetricsSnapshot;
use crate::error::{Error, Result};

/// Trait for exporting metrics to different sinks
pub trait MetricsExporter: Send + Sync {
    /// Export a metrics snapshot
    fn export(&self, snapshot: &MetricsSnapshot) -> Result<()>;
}

/// Export metrics to a JSON file
#[derive(Debug)]
pub struct JsonExporter {
    output_path: std::path::PathBuf,
}

impl JsonExporter {
    /// Exporter writing to `output_path`, replacing any existing file
    pub fn new(output_path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
        }
    }
}

impl MetricsExporter for JsonExporter {
    fn export(&self, snapshot: &MetricsSnapshot) -> Result<()> {
        let serializable = SerializableSnapshot::from(snapshot);
        let json = serde_json::to_string_pretty(&serializable)
            .map_err(|e| Error::telemetry(format!("JSON serialization failed: {}", e)))?;

        std::fs::write(&self.output_path, json)?;

        Ok(())
    }
}

/// Emit metrics as a single structured `tracing` event
#[derive(Debug, Default)]
pub struct LogExporter;

impl MetricsExporter for LogExporter {
    fn export(&self, snapshot: &MetricsSnapshot) -> Result<()> {
        tracing::info!(
            buffers_created = snapshot.buffers_created,
            bytes_allocated = snapshot.bytes_allocated,
            device_copies = snapshot.device_copies,
            host_copies = snapshot.host_copies,
            kernels_compiled = snapshot.kernels_compiled,
            dispatches = snapshot.dispatches,
            submissions = snapshot.submissions,
            avg_block_us = snapshot.avg_block_ns as f64 / 1_000.0,
            "gpu metrics"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, serde::Serialize)]
struct SerializableSnapshot {
    uptime_secs: f64,
    buffers_created: u64,
    allocated_mb: f64,
    device_copies: u64,
    host_copies: u64,
    kernels_compiled: u64,
    dispatches: u64,
    submissions: u64,
    blocks: u64,
    avg_block_us: f64,
    p99_block_us: f64,
    max_block_us: f64,
    dispatches_per_second: f64,
}

impl From<&MetricsSnapshot> for SerializableSnapshot {
    fn from(snapshot: &MetricsSnapshot) -> Self {
        Self {
            uptime_secs: snapshot.uptime.as_secs_f64(),
            buffers_created: snapshot.buffers_created,
            allocated_mb: snapshot.bytes_allocated as f64 / (1024.0 * 1024.0),
            device_copies: snapshot.device_copies,
            host_copies: snapshot.host_copies,
            kernels_compiled: snapshot.kernels_compiled,
            dispatches: snapshot.dispatches,
            submissions: snapshot.submissions,
            blocks: snapshot.blocks,
            avg_block_us: snapshot.avg_block_ns as f64 / 1_000.0,
            p99_block_us: snapshot.p99_block_ns as f64 / 1_000.0,
            max_block_us: snapshot.max_block_ns as f64 / 1_000.0,
            dispatches_per_second: snapshot.dispatches_per_second(),
        }
    }
}
