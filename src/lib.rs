//! brr - a thin GPU compute runtime on wgpu
//!
//! Buffers are allocated lazily and migrate between host-mappable and
//! device-storage representations only when a capability is requested.
//! Kernels are written as the body of a WGSL entry point; binding
//! declarations and the invocation-index preamble are generated.
//!
//! # Quick Start
//!
//! ```no_run
//! use brr::prelude::*;
//!
//! # async fn demo() -> brr::Result<()> {
//! let gpu = DeviceContext::new();
//!
//! let n = 1024;
//! let mut a = gpu.alloc(DType::F32, n)?;
//! let mut b = gpu.alloc(DType::F32, n)?;
//! a.write(|data| {
//!     for (i, x) in data.iter_mut().enumerate() {
//!         *x = i as f32;
//!     }
//! })
//! .await?;
//!
//! let double = gpu
//!     .compile(
//!         &[KernelArg::f32("A"), KernelArg::f32("B")],
//!         |ctx| {
//!             format!(
//!                 "for (var i = global_invocation_index; i < {n}u; i += {stride}u) {{
//!                     {b}[i] = {a}[i] * 2.0;
//!                 }}",
//!                 n = n,
//!                 stride = ctx.threads,
//!                 a = ctx.arg(0),
//!                 b = ctx.arg(1),
//!             )
//!         },
//!         KernelOptions::builder().workgroup([256]).dispatch([4]).build()?,
//!     )
//!     .await?;
//!
//! double.run(&mut [&mut a, &mut b]).await?;
//! gpu.block().await?;
//! let doubled = b.to_vec().await?;
//! assert_eq!(doubled[3], 6.0);
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Lazy buffers**: no device allocation until a buffer is first used
//! - **Copy-on-demand state machine**: the fewest copies needed to move data
//!   between host and device representations
//! - **Templated kernels**: workgroup validation and generated bindings
//! - **Telemetry**: per-context counters, JSON export (optional)

#![warn(missing_docs, missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod gpu;
pub mod prelude;
pub mod telemetry;

// Re-export key types at crate root
pub use config::{Config, ConfigBuilder};
pub use error::{Error, Result};
pub use gpu::{DType, DeviceContext, Kernel, KernelArg, KernelOptions, Memory};
