//! Commonly used types, for glob import.

pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{Error, Result};
pub use crate::gpu::{
    DType, DeviceContext, Kernel, KernelArg, KernelCompiler, KernelContext, KernelOptions, Memory,
    UsageState,
};
pub use crate::telemetry::{Metrics, MetricsSnapshot};
