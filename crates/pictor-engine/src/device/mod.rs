//! GPU device + surface management.
//!
//! Responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue
//! - configuring the surface (present-mode negotiation, resize)
//! - acquiring frames and providing encoders/views for rendering

mod gpu;

pub use gpu::{Gpu, GpuFrame, GpuInit, SurfaceErrorAction};

use crate::render::RenderError;

/// Opens an out-of-memory error scope around a resource allocation.
///
/// wgpu reports allocation failure through the error-scope queue rather
/// than return codes; pairing these two helpers turns it back into a
/// `Result` at setup time.
pub(crate) fn begin_alloc_scope(device: &wgpu::Device) {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
}

pub(crate) fn end_alloc_scope(device: &wgpu::Device, what: &str) -> Result<(), RenderError> {
    match pollster::block_on(device.pop_error_scope()) {
        None => Ok(()),
        Some(e) => Err(RenderError::Allocation(format!("{what}: {e}"))),
    }
}
