//! Turning templated kernels into compute pipelines.

use super::codegen::{KernelArg, KernelContext, KernelSource};
use super::context::DeviceContext;
use super::kernel::Kernel;
use super::options::KernelOptions;
use crate::error::{Error, Result};
use std::sync::Arc;

/// Compiles kernels for one [`DeviceContext`].
#[derive(Debug, Clone)]
pub struct KernelCompiler {
    ctx: Arc<DeviceContext>,
}

impl KernelCompiler {
    /// Compiler targeting `ctx`
    pub fn new(ctx: Arc<DeviceContext>) -> Self {
        Self { ctx }
    }

    /// Validate `options` and `args`, generate the module from `template` and
    /// build a pipeline with one read-write storage binding per argument.
    ///
    /// Configuration errors are reported before the device is touched; errors
    /// from the WGSL front end come back as [`Error::Compilation`] with the
    /// host message unchanged.
    pub async fn compile<F>(
        &self,
        args: &[KernelArg],
        template: F,
        options: KernelOptions,
    ) -> Result<Kernel>
    where
        F: FnOnce(&KernelContext) -> String,
    {
        let source = KernelSource::generate(args, &options, template)?;
        tracing::trace!(name = options.name(), code = %source.code, "generated kernel");

        let label = options.name();
        let ((pipeline, bind_group_layout), caught) = self
            .ctx
            .capture(|device, _| {
                let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(label),
                    source: wgpu::ShaderSource::Wgsl(source.code.as_str().into()),
                });

                let entries: Vec<wgpu::BindGroupLayoutEntry> = (0..args.len())
                    .map(|binding| wgpu::BindGroupLayoutEntry {
                        binding: binding as u32,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: false },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    })
                    .collect();

                let bind_group_layout =
                    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                        label: Some(label),
                        entries: &entries,
                    });

                let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some(label),
                    bind_group_layouts: &[&bind_group_layout],
                    push_constant_ranges: &[],
                });

                let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(label),
                    layout: Some(&pipeline_layout),
                    module: &shader,
                    entry_point: label,
                });

                (pipeline, bind_group_layout)
            })
            .await?;

        if let Some(err) = caught {
            tracing::error!(name = label, error = %err, "kernel compilation failed");
            return Err(Error::compilation(err.to_string()));
        }

        self.ctx.metrics().record_kernel_compiled();
        tracing::debug!(
            name = label,
            args = args.len(),
            workgroup = ?options.workgroup(),
            dispatch = ?options.dispatch(),
            "compiled kernel"
        );

        Ok(Kernel::new(
            Arc::clone(&self.ctx),
            source,
            args.to_vec(),
            options,
            pipeline,
            bind_group_layout,
        ))
    }
}
