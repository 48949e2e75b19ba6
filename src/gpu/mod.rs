//! GPU buffers and templated compute kernels on wgpu.

pub mod buffer;
pub mod codegen;
pub mod compiler;
pub mod context;
pub mod dtype;
pub mod kernel;
pub mod options;
pub mod state;

pub use buffer::Memory;
pub use codegen::{KernelArg, KernelContext, KernelSource};
pub use compiler::KernelCompiler;
pub use context::DeviceContext;
pub use dtype::DType;
pub use kernel::Kernel;
pub use options::{KernelOptions, KernelOptionsBuilder};
pub use state::{Capability, CopyKind, Transition, UsageState};
