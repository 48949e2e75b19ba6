//! Lazily materialized GPU buffers.
//!
//! A [`Memory`] is one logical array whose device allocation migrates between
//! host-readable, host-writable and storage representations as callers ask
//! for those capabilities. Each migration allocates a fresh device buffer,
//! carries the contents over when they matter and drops the old allocation,
//! so a `Memory` never owns more than one device buffer.

use super::context::DeviceContext;
use super::dtype::DType;
use super::state::{Capability, CopyKind, Transition, UsageState};
use crate::error::{Error, Result};
use std::sync::Arc;

#[derive(Debug)]
struct DeviceBuffer {
    buffer: wgpu::Buffer,
    state: UsageState,
}

/// Unmaps a buffer when dropped, including during unwinding.
struct Unmap<'a>(&'a wgpu::Buffer);

impl Drop for Unmap<'_> {
    fn drop(&mut self) {
        self.0.unmap();
    }
}

/// One logical GPU array of `numel` elements.
#[derive(Debug)]
pub struct Memory {
    ctx: Arc<DeviceContext>,
    dtype: DType,
    numel: usize,
    size_bytes: u64,
    initial: UsageState,
    slot: Option<DeviceBuffer>,
}

impl Memory {
    pub(crate) fn new(
        ctx: Arc<DeviceContext>,
        dtype: DType,
        numel: usize,
        initial: UsageState,
    ) -> Result<Self> {
        if !dtype.is_host_supported() {
            return Err(Error::config(format!(
                "unsupported element type '{}': only f32 buffers can be allocated",
                dtype
            )));
        }

        if numel == 0 {
            return Err(Error::config("invalid size: buffers need at least one element"));
        }

        let size_bytes = numel
            .checked_mul(dtype.size_bytes())
            .and_then(|bytes| u64::try_from(bytes).ok())
            .ok_or_else(|| Error::config(format!("invalid size: {} elements overflow", numel)))?;

        Ok(Self {
            ctx,
            dtype,
            numel,
            size_bytes,
            initial,
            slot: None,
        })
    }

    /// Element type
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Number of elements
    pub fn numel(&self) -> usize {
        self.numel
    }

    /// Size of the device allocation in bytes
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Context the buffer was allocated on
    pub fn context(&self) -> &Arc<DeviceContext> {
        &self.ctx
    }

    /// Usage state of the current device buffer, `None` before first use
    pub fn state(&self) -> Option<UsageState> {
        self.slot.as_ref().map(|slot| slot.state)
    }

    /// Whether a device buffer exists yet
    pub fn is_materialized(&self) -> bool {
        self.slot.is_some()
    }

    /// Create the device buffer in its initial state; a no-op once it exists.
    pub async fn init(&mut self) -> Result<()> {
        if self.slot.is_none() {
            let buffer = self.ctx.create_buffer(self.size_bytes, self.initial).await?;
            self.replace(buffer, self.initial);
        }
        Ok(())
    }

    /// Device buffer that can be mapped for reading (`read_gpu`).
    pub async fn ensure_read_capable(&mut self) -> Result<&wgpu::Buffer> {
        self.ensure_direct(Capability::HostRead).await
    }

    /// Device buffer that can be bound to a kernel (`storage_gpu`).
    pub async fn ensure_storage_capable(&mut self) -> Result<&wgpu::Buffer> {
        self.ensure_direct(Capability::Storage).await
    }

    /// Device buffer that can be mapped for writing (`write_gpu`).
    ///
    /// Existing contents are carried over by reading the current buffer on
    /// the host and writing them into the new one before the swap.
    pub async fn ensure_write_capable(&mut self) -> Result<&wgpu::Buffer> {
        let step = self.plan(Capability::HostWrite)?;

        // Never materialized, so there is nothing to preserve.
        if self.slot.is_none() {
            return self.ensure_direct(Capability::HostWrite).await;
        }

        if !step.is_noop() {
            let ctx = Arc::clone(&self.ctx);
            let fresh = ctx.create_buffer(self.size_bytes, step.target).await?;
            {
                let old = self.ensure_direct(Capability::HostRead).await?;
                ctx.map_buffer(old, wgpu::MapMode::Read).await?;
                let _old_unmap = Unmap(old);

                ctx.map_buffer(&fresh, wgpu::MapMode::Write).await?;
                let _fresh_unmap = Unmap(&fresh);
                let src = old.slice(..).get_mapped_range();
                let mut dst = fresh.slice(..).get_mapped_range_mut();
                dst.copy_from_slice(&src);
            }
            ctx.metrics().record_host_copy();
            self.replace(fresh, step.target);
        }

        self.current()
    }

    /// Map for reading, hand `f` the contents and unmap afterwards.
    pub async fn read<F, R>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&[f32]) -> R,
    {
        let ctx = Arc::clone(&self.ctx);
        let buffer = self.ensure_read_capable().await?;
        ctx.map_buffer(buffer, wgpu::MapMode::Read).await?;

        let _unmap = Unmap(buffer);
        let view = buffer.slice(..).get_mapped_range();
        let out = f(bytemuck::cast_slice(&view));
        Ok(out)
    }

    /// Map for writing, let `f` fill the contents in place and unmap afterwards.
    pub async fn write<F, R>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&mut [f32]) -> R,
    {
        let ctx = Arc::clone(&self.ctx);
        let buffer = self.ensure_write_capable().await?;
        ctx.map_buffer(buffer, wgpu::MapMode::Write).await?;

        let _unmap = Unmap(buffer);
        let mut view = buffer.slice(..).get_mapped_range_mut();
        let out = f(bytemuck::cast_slice_mut(&mut view));
        Ok(out)
    }

    /// Copy the contents into a new vector.
    pub async fn to_vec(&mut self) -> Result<Vec<f32>> {
        self.read(|data| data.to_vec()).await
    }

    /// Overwrite the contents with `data`, which must hold exactly `numel` values.
    pub async fn copy_from_slice(&mut self, data: &[f32]) -> Result<()> {
        if data.len() != self.numel {
            return Err(Error::config(format!(
                "length mismatch: buffer holds {} elements, got {}",
                self.numel,
                data.len()
            )));
        }
        self.write(|dst| dst.copy_from_slice(data)).await
    }

    /// Current device buffer for binding; only valid after a storage transition.
    pub(crate) fn raw(&self) -> Option<&wgpu::Buffer> {
        self.slot.as_ref().map(|slot| &slot.buffer)
    }

    fn plan(&self, capability: Capability) -> Result<Transition> {
        self.state().unwrap_or(self.initial).transition(capability)
    }

    fn current(&self) -> Result<&wgpu::Buffer> {
        self.raw()
            .ok_or_else(|| Error::gpu("buffer has no device allocation"))
    }

    /// Execute a transition that needs no host round trip.
    async fn ensure_direct(&mut self, capability: Capability) -> Result<&wgpu::Buffer> {
        let step = self.plan(capability)?;

        if self.slot.is_none() || !step.is_noop() {
            let fresh = self.ctx.create_buffer(self.size_bytes, step.target).await?;

            if let Some(current) = &self.slot {
                match step.copy {
                    CopyKind::None => {}
                    CopyKind::Device => {
                        self.ctx
                            .copy_buffer(&current.buffer, &fresh, self.size_bytes)
                            .await?
                    }
                    CopyKind::Host => {
                        return Err(Error::gpu(format!(
                            "transition {} -> {} needs a host copy",
                            step.from, step.target
                        )));
                    }
                }
            }

            self.replace(fresh, step.target);
        }

        self.current()
    }

    fn replace(&mut self, buffer: wgpu::Buffer, state: UsageState) {
        tracing::debug!(
            from = ?self.state(),
            to = %state,
            bytes = self.size_bytes,
            "buffer transition"
        );
        // The previous allocation, if any, is released here.
        self.slot = Some(DeviceBuffer { buffer, state });
    }
}
