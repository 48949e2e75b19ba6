//! Device acquisition and queue-level helpers using wgpu.

use super::buffer::Memory;
use super::codegen::{KernelArg, KernelContext};
use super::compiler::KernelCompiler;
use super::dtype::DType;
use super::kernel::Kernel;
use super::options::KernelOptions;
use super::state::UsageState;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::telemetry::Metrics;
use futures::channel::oneshot;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;

#[derive(Debug)]
struct Gpu {
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
}

/// Cached outcome of a failed acquisition; GPU unavailability is not transient.
#[derive(Debug, Clone)]
enum AcquireFailure {
    NoAdapter,
    Device(String),
}

impl From<&AcquireFailure> for Error {
    fn from(failure: &AcquireFailure) -> Self {
        match failure {
            AcquireFailure::NoAdapter => Error::NoAdapter,
            AcquireFailure::Device(msg) => Error::Device(msg.clone()),
        }
    }
}

/// Lazily acquired adapter, device and queue shared by buffers and kernels.
///
/// Nothing touches the host GPU runtime until the first call that needs a
/// device. Acquisition happens exactly once; its outcome, success or failure,
/// is cached for the lifetime of the context.
#[derive(Debug)]
pub struct DeviceContext {
    config: Config,
    gpu: OnceCell<std::result::Result<Gpu, AcquireFailure>>,
    metrics: Metrics,
}

impl DeviceContext {
    /// Create a context with the default configuration
    pub fn new() -> Arc<Self> {
        Arc::new(Self::from_parts(Config::default()))
    }

    /// Create a context with a custom configuration
    pub fn with_config(config: Config) -> Result<Arc<Self>> {
        config.validate()?;
        Ok(Arc::new(Self::from_parts(config)))
    }

    fn from_parts(config: Config) -> Self {
        Self {
            config,
            gpu: OnceCell::new(),
            metrics: Metrics::new(),
        }
    }

    async fn gpu(&self) -> Result<&Gpu> {
        let outcome = self.gpu.get_or_init(|| acquire(&self.config)).await;
        outcome.as_ref().map_err(Error::from)
    }

    /// Whether acquisition has run (successfully or not)
    pub fn is_initialized(&self) -> bool {
        self.gpu.initialized()
    }

    /// Adapter the device was requested from, acquiring it on first use
    pub async fn adapter(&self) -> Result<&wgpu::Adapter> {
        Ok(&self.gpu().await?.adapter)
    }

    /// Logical device, acquiring it on first use
    pub async fn device(&self) -> Result<&wgpu::Device> {
        Ok(&self.gpu().await?.device)
    }

    /// Submission queue of the device
    pub async fn queue(&self) -> Result<&wgpu::Queue> {
        Ok(&self.gpu().await?.queue)
    }

    /// Name, backend and vendor of the adapter in use
    pub async fn adapter_info(&self) -> Result<wgpu::AdapterInfo> {
        Ok(self.adapter().await?.get_info())
    }

    /// Settings the context was created with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Counters for work issued through this context
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Wait until everything submitted to the queue so far has completed.
    pub async fn block(&self) -> Result<()> {
        let gpu = self.gpu().await?;
        let started = Instant::now();

        let (tx, rx) = oneshot::channel();
        gpu.queue.on_submitted_work_done(move || {
            let _ = tx.send(());
        });
        gpu.device.poll(wgpu::Maintain::Wait);
        rx.await
            .map_err(|_| Error::gpu("on_submitted_work_done callback dropped"))?;

        self.metrics.record_block(started.elapsed());
        Ok(())
    }

    /// Allocate a host-accessible buffer of `numel` elements.
    ///
    /// Only validates; no device resource exists until the buffer is first used.
    pub fn alloc(self: &Arc<Self>, dtype: DType, numel: usize) -> Result<Memory> {
        Memory::new(Arc::clone(self), dtype, numel, UsageState::MapRead)
    }

    /// Allocate a device-only scratch buffer that starts out as pure `STORAGE`.
    ///
    /// It can be bound to kernels but never read or written from the host.
    pub fn alloc_device_only(self: &Arc<Self>, dtype: DType, numel: usize) -> Result<Memory> {
        Memory::new(Arc::clone(self), dtype, numel, UsageState::Storage)
    }

    /// Compile a templated kernel against this context.
    pub async fn compile<F>(
        self: &Arc<Self>,
        args: &[KernelArg],
        template: F,
        options: KernelOptions,
    ) -> Result<Kernel>
    where
        F: FnOnce(&KernelContext) -> String,
    {
        KernelCompiler::new(Arc::clone(self))
            .compile(args, template, options)
            .await
    }

    /// Run `f` inside a validation error scope, returning what the scope caught.
    pub(crate) async fn capture<T, F>(&self, f: F) -> Result<(T, Option<wgpu::Error>)>
    where
        F: FnOnce(&wgpu::Device, &wgpu::Queue) -> T,
    {
        let gpu = self.gpu().await?;
        gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(&gpu.device, &gpu.queue);
        let caught = gpu.device.pop_error_scope().await;
        Ok((value, caught))
    }

    /// Like [`capture`](Self::capture), but a caught error fails the operation.
    pub(crate) async fn scoped<T, F>(&self, what: &str, f: F) -> Result<T>
    where
        F: FnOnce(&wgpu::Device, &wgpu::Queue) -> T,
    {
        match self.capture(f).await? {
            (value, None) => Ok(value),
            (_, Some(err)) => {
                tracing::error!(operation = what, error = %err, "wgpu validation error");
                Err(Error::gpu(format!("{}: {}", what, err)))
            }
        }
    }

    pub(crate) async fn create_buffer(&self, size: u64, state: UsageState) -> Result<wgpu::Buffer> {
        let buffer = self
            .scoped("create buffer", |device, _| {
                device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("brr-memory"),
                    size,
                    usage: state.usages(),
                    mapped_at_creation: false,
                })
            })
            .await?;

        self.metrics.record_buffer_created(size);
        tracing::debug!(size, state = %state, "created device buffer");
        Ok(buffer)
    }

    /// Encode and submit a full-length copy; completion is ordered by the queue.
    pub(crate) async fn copy_buffer(
        &self,
        src: &wgpu::Buffer,
        dst: &wgpu::Buffer,
        size: u64,
    ) -> Result<()> {
        self.scoped("copy buffer", |device, queue| {
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("brr-copy-encoder"),
            });
            encoder.copy_buffer_to_buffer(src, 0, dst, 0, size);
            queue.submit(Some(encoder.finish()));
        })
        .await?;

        self.metrics.record_device_copy();
        self.metrics.record_submission();
        Ok(())
    }

    /// Map the whole buffer and wait for the mapping to resolve.
    pub(crate) async fn map_buffer(&self, buffer: &wgpu::Buffer, mode: wgpu::MapMode) -> Result<()> {
        let device = self.device().await?;

        let (tx, rx) = oneshot::channel();
        buffer.slice(..).map_async(mode, move |res| {
            let _ = tx.send(res);
        });
        device.poll(wgpu::Maintain::Wait);

        rx.await
            .map_err(|_| Error::gpu("map_async callback dropped"))??;
        Ok(())
    }
}

async fn acquire(config: &Config) -> std::result::Result<Gpu, AcquireFailure> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: config.backends,
        ..Default::default()
    });

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: config.power_preference,
            compatible_surface: None,
            force_fallback_adapter: config.force_fallback_adapter,
        })
        .await
        .ok_or_else(|| {
            tracing::error!(backends = ?config.backends, "no GPU adapter found");
            AcquireFailure::NoAdapter
        })?;

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some(&config.device_label),
                required_features: config.required_features,
                required_limits: config.required_limits.clone(),
            },
            None,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "failed to request device");
            AcquireFailure::Device(e.to_string())
        })?;

    // Errors that matter are captured in scopes; anything else is only logged.
    device.on_uncaptured_error(Box::new(|err: wgpu::Error| {
        tracing::error!(error = %err, "uncaptured wgpu error");
    }));

    let info = adapter.get_info();
    tracing::info!(adapter = %info.name, backend = ?info.backend, "acquired GPU device");

    Ok(Gpu {
        adapter,
        device,
        queue,
    })
}
