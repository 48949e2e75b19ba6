//! Compiled kernels and their dispatch.

use super::buffer::Memory;
use super::codegen::{KernelArg, KernelContext, KernelSource};
use super::context::DeviceContext;
use super::dtype::DType;
use super::options::KernelOptions;
use crate::error::{Error, Result};
use std::sync::Arc;

/// A compute pipeline built from a templated kernel, ready to dispatch.
///
/// Immutable once compiled; [`run`](Kernel::run) may be called any number of
/// times with different buffers.
#[derive(Debug)]
pub struct Kernel {
    ctx: Arc<DeviceContext>,
    source: KernelSource,
    args: Vec<KernelArg>,
    options: KernelOptions,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl Kernel {
    pub(crate) fn new(
        ctx: Arc<DeviceContext>,
        source: KernelSource,
        args: Vec<KernelArg>,
        options: KernelOptions,
        pipeline: wgpu::ComputePipeline,
        bind_group_layout: wgpu::BindGroupLayout,
    ) -> Self {
        Self {
            ctx,
            source,
            args,
            options,
            pipeline,
            bind_group_layout,
        }
    }

    /// Generated WGSL
    pub fn source(&self) -> &str {
        &self.source.code
    }

    /// Values the template was rendered with
    pub fn context(&self) -> &KernelContext {
        &self.source.context
    }

    /// Arguments in binding order
    pub fn args(&self) -> &[KernelArg] {
        &self.args
    }

    /// Launch configuration
    pub fn options(&self) -> &KernelOptions {
        &self.options
    }

    /// Bind `buffers` in argument order and submit one dispatch.
    ///
    /// Every buffer is moved to a storage-capable state first. Returns once the
    /// work is submitted; use [`DeviceContext::block`] or read a buffer to
    /// observe completion.
    pub async fn run(&self, buffers: &mut [&mut Memory]) -> Result<()> {
        self.check_args(buffers)?;

        for memory in buffers.iter_mut() {
            memory.ensure_storage_capable().await?;
        }

        let bound = buffers
            .iter()
            .map(|memory| {
                memory
                    .raw()
                    .ok_or_else(|| Error::gpu("argument lost its device allocation"))
            })
            .collect::<Result<Vec<_>>>()?;

        let (x, y, z) = self.options.dispatch_xyz();
        let label = self.options.name();

        self.ctx
            .scoped("dispatch", |device, queue| {
                let entries: Vec<wgpu::BindGroupEntry> = bound
                    .iter()
                    .enumerate()
                    .map(|(binding, buffer)| wgpu::BindGroupEntry {
                        binding: binding as u32,
                        resource: buffer.as_entire_binding(),
                    })
                    .collect();

                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(label),
                    layout: &self.bind_group_layout,
                    entries: &entries,
                });

                let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("brr-kernel-encoder"),
                });

                {
                    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                        label: Some("brr-compute-pass"),
                        timestamp_writes: None,
                    });

                    pass.set_pipeline(&self.pipeline);
                    pass.set_bind_group(0, &bind_group, &[]);
                    pass.dispatch_workgroups(x, y, z);
                }

                queue.submit(Some(encoder.finish()));
            })
            .await?;

        let metrics = self.ctx.metrics();
        metrics.record_dispatch();
        metrics.record_submission();
        tracing::debug!(name = label, workgroups = ?(x, y, z), "dispatched kernel");

        Ok(())
    }

    fn check_args(&self, buffers: &[&mut Memory]) -> Result<()> {
        if buffers.len() != self.args.len() {
            return Err(Error::usage(format!(
                "kernel '{}' takes {} arguments, got {}",
                self.options.name(),
                self.args.len(),
                buffers.len()
            )));
        }

        for (arg, memory) in self.args.iter().zip(buffers.iter()) {
            if !Arc::ptr_eq(memory.context(), &self.ctx) {
                return Err(Error::usage(format!(
                    "argument '{}' was allocated on a different device context",
                    arg.name
                )));
            }

            if !binds(arg, memory.dtype()) {
                return Err(Error::usage(format!(
                    "argument '{}' expects {} elements, got a {} buffer",
                    arg.name,
                    arg.ty,
                    memory.dtype()
                )));
            }
        }

        Ok(())
    }
}

/// A buffer binds to an argument when their scalar element sizes agree, so
/// `u32` or `i32` arguments may view `f32` storage bit for bit.
fn binds(arg: &KernelArg, dtype: DType) -> bool {
    arg.dtype()
        .map_or(false, |scalar| scalar.size_bytes() == dtype.size_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_compares_element_size() {
        assert!(binds(&KernelArg::f32("A"), DType::F32));
        assert!(binds(&KernelArg::new("dims", "u32"), DType::F32));
        assert!(binds(&KernelArg::new("v", "vec4<i32>"), DType::F32));
        assert!(!binds(&KernelArg::new("h", "f16"), DType::F32));
        assert!(!binds(&KernelArg::new("b", "bool"), DType::F32));
    }
}
