//! GPU geometry: vertex/index buffers plus their layout description.
//!
//! Geometry is immutable after upload: buffers are created with their final
//! contents and carry no copy-destination usage, so redraws re-bind the same
//! buffers without re-transfer. Dynamic geometry would need a distinct
//! streaming path, which this system does not have.

use bytemuck::Pod;
use wgpu::util::DeviceExt;

use crate::device;
use crate::render::RenderError;

/// Ordered attribute descriptors plus the record stride, describing how one
/// vertex buffer feeds the vertex stage's `@location` inputs.
///
/// The renderer cross-validates this against the program's reflected inputs
/// before creating a pipeline, so a layout/shader mismatch fails at setup
/// instead of rendering garbage.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexLayout {
    pub stride: u64,
    pub attributes: Vec<wgpu::VertexAttribute>,
}

impl VertexLayout {
    pub fn new(stride: u64, attributes: Vec<wgpu::VertexAttribute>) -> Self {
        Self { stride, attributes }
    }

    /// Layout for a `#[repr(C)]` vertex record type.
    pub fn of<V: Pod>(attributes: Vec<wgpu::VertexAttribute>) -> Self {
        Self {
            stride: std::mem::size_of::<V>() as u64,
            attributes,
        }
    }

    pub fn buffer_layout(&self) -> wgpu::VertexBufferLayout<'_> {
        wgpu::VertexBufferLayout {
            array_stride: self.stride,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &self.attributes,
        }
    }
}

/// Immutable GPU mesh: one vertex buffer, one `u16` index buffer
/// (triangle-list), and the layout binding them to a program.
pub struct Mesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    layout: VertexLayout,
}

impl Mesh {
    /// Uploads vertex and index data, transferring both at creation.
    ///
    /// Allocation failures are captured through a device error scope and
    /// surfaced as [`RenderError::Allocation`]; they are setup-fatal, there
    /// is no retry policy.
    pub fn upload<V: Pod>(
        device: &wgpu::Device,
        label: &str,
        vertices: &[V],
        indices: &[u16],
        layout: VertexLayout,
    ) -> Result<Mesh, RenderError> {
        if layout.stride != std::mem::size_of::<V>() as u64 {
            return Err(RenderError::LayoutMismatch {
                detail: format!(
                    "`{label}`: layout stride {} does not match vertex record size {}",
                    layout.stride,
                    std::mem::size_of::<V>()
                ),
            });
        }

        device::begin_alloc_scope(device);

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} vertex buffer")),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} index buffer")),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        device::end_alloc_scope(device, label)?;

        Ok(Mesh {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
            layout,
        })
    }

    pub fn vertex_buffer(&self) -> &wgpu::Buffer {
        &self.vertex_buffer
    }

    pub fn index_buffer(&self) -> &wgpu::Buffer {
        &self.index_buffer
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }
}
