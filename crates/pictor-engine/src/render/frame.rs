use std::collections::HashMap;
use std::num::NonZeroU64;

use crate::coords::{Mat3, Vec2};
use crate::device;
use crate::geometry::{Mesh, VertexLayout};
use crate::paint::Color;
use crate::shader::{
    BindingKind, CompiledProgram, LinkedStages, ShaderError, TextureSlot, UniformSlot, VertexInput,
};
use crate::texture::Texture;

use super::{RenderCtx, RenderError, RenderTarget};

/// Per-frame uniforms (projection).
pub const FRAME_GROUP: u32 = 0;
/// Per-draw uniforms (model, tint), bound with dynamic offsets.
pub const DRAW_GROUP: u32 = 1;
/// Texture + sampler.
pub const TEXTURE_GROUP: u32 = 2;

/// Device-to-NDC projection, written once per frame from the viewport.
pub const UNIFORM_PROJECTION: &str = "u_to_ndc";
/// Per-draw model matrix.
pub const UNIFORM_MODEL: &str = "u_model";
/// Per-draw tint color. Optional in the program; items still carry a tint,
/// it is simply not uploaded when the program never reads it.
pub const UNIFORM_TINT: &str = "u_tint";
/// Per-draw texture-coordinate transform (sprite-sheet cell selection).
/// Optional, like the tint.
pub const UNIFORM_TEX_TRANSFORM: &str = "u_tex_transform";

const MAT3_UNIFORM_SIZE: u32 = 48;
const VEC4_UNIFORM_SIZE: u32 = 16;
const INITIAL_DRAW_CAPACITY: u32 = 64;

/// Placement of one drawable: translate · rotate · scale, applied to the
/// mesh's local coordinates.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Instance2D {
    pub position: Vec2,
    pub scale: Vec2,
    pub rotation: f32,
}

impl Default for Instance2D {
    fn default() -> Self {
        Self {
            position: Vec2::zero(),
            scale: Vec2::splat(1.0),
            rotation: 0.0,
        }
    }
}

impl Instance2D {
    pub fn model_matrix(&self) -> Mat3 {
        Mat3::model(self.position, self.scale, self.rotation)
    }
}

/// What the pass does with the existing target contents.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum PassLoad {
    /// Clear to a color before drawing.
    Clear(Color),
    /// Keep what earlier passes produced this frame.
    Keep,
}

/// One draw request for [`FrameRenderer::render`].
///
/// `texture: None` binds the renderer's white fallback, so the tint alone
/// determines the color for untextured programs that still sample.
/// `uv_transform` maps the mesh's texture coordinates onto the sampled
/// region; identity samples the whole texture.
pub struct DrawItem<'a> {
    pub mesh: &'a Mesh,
    pub instance: Instance2D,
    pub tint: Color,
    pub uv_transform: Mat3,
    pub texture: Option<&'a Texture>,
}

struct FrameUniform {
    name: String,
    slot: UniformSlot,
    buffer: wgpu::Buffer,
}

/// A dynamic-offset arena: one aligned region per draw item. Regions are
/// rewritten every frame; the arena grows geometrically and never shrinks.
struct DrawUniform {
    slot: UniformSlot,
    stride: u32,
    buffer: wgpu::Buffer,
}

/// Renders draw lists through one compiled program.
///
/// Construction reflects the program's resources into bind group layouts and
/// allocates the uniform storage; per-mesh-layout pipelines are built lazily
/// on first use and cached. All validation that can fail happens at
/// construction or at first use of a vertex layout, never mid-pass.
pub struct FrameRenderer {
    program: CompiledProgram,
    format: wgpu::TextureFormat,

    pipeline_layout: wgpu::PipelineLayout,
    pipelines: Vec<(VertexLayout, wgpu::RenderPipeline)>,

    frame_uniforms: Vec<FrameUniform>,
    frame_bind_group: wgpu::BindGroup,

    draw_layout: wgpu::BindGroupLayout,
    draw_uniforms: Vec<DrawUniform>,
    draw_bind_group: wgpu::BindGroup,
    draw_capacity: u32,
    model_index: usize,
    tint_index: Option<usize>,
    tex_transform_index: Option<usize>,

    texture_layout: Option<wgpu::BindGroupLayout>,
    texture_slots: Vec<TextureSlot>,
    texture_bind_groups: HashMap<u64, wgpu::BindGroup>,
    white: Option<(Texture, wgpu::BindGroup)>,
}

impl FrameRenderer {
    /// Builds the renderer for a program.
    ///
    /// The program must read `u_to_ndc` in group 0 and `u_model` in group 1;
    /// `u_tint` and `u_tex_transform` in group 1 are honored when present.
    /// Any other group-1 uniform or an out-of-convention binding is a link
    /// failure.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        program: CompiledProgram,
        format: wgpu::TextureFormat,
    ) -> Result<FrameRenderer, RenderError> {
        let linked = program.linked();

        check_binding_conventions(linked)?;

        let align = device.limits().min_uniform_buffer_offset_alignment;

        device::begin_alloc_scope(device);

        // Group 0: one plain uniform buffer per per-frame uniform.
        let mut frame_uniforms = Vec::new();
        let mut frame_entries = Vec::new();
        for (name, slot) in &linked.uniforms {
            if slot.group != FRAME_GROUP {
                continue;
            }
            frame_entries.push(wgpu::BindGroupLayoutEntry {
                binding: slot.binding,
                visibility: slot.stages,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(u64::from(slot.size)),
                },
                count: None,
            });
            frame_uniforms.push(FrameUniform {
                name: name.clone(),
                slot: *slot,
                buffer: device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("per-frame uniform `{name}`")),
                    size: u64::from(slot.size),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                }),
            });
        }
        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("per-frame bind group layout"),
            entries: &frame_entries,
        });
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("per-frame bind group"),
            layout: &frame_layout,
            entries: &frame_uniforms
                .iter()
                .map(|u| wgpu::BindGroupEntry {
                    binding: u.slot.binding,
                    resource: u.buffer.as_entire_binding(),
                })
                .collect::<Vec<_>>(),
        });

        // Group 1: dynamic-offset arenas, one region per draw item.
        let mut draw_uniforms = Vec::new();
        let mut draw_entries = Vec::new();
        let mut model_index = None;
        let mut tint_index = None;
        let mut tex_transform_index = None;
        for (name, slot) in &linked.uniforms {
            if slot.group != DRAW_GROUP {
                continue;
            }
            draw_entries.push(wgpu::BindGroupLayoutEntry {
                binding: slot.binding,
                visibility: slot.stages,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(u64::from(slot.size)),
                },
                count: None,
            });
            let stride = slot.size.div_ceil(align) * align;
            match name.as_str() {
                UNIFORM_MODEL => model_index = Some(draw_uniforms.len()),
                UNIFORM_TINT => tint_index = Some(draw_uniforms.len()),
                // Only the three convention names reach here, checked above.
                _ => tex_transform_index = Some(draw_uniforms.len()),
            }
            draw_uniforms.push(DrawUniform {
                slot: *slot,
                stride,
                buffer: make_draw_arena(device, name, stride, INITIAL_DRAW_CAPACITY),
            });
        }
        let draw_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("per-draw bind group layout"),
            entries: &draw_entries,
        });
        let draw_bind_group = make_draw_bind_group(device, &draw_layout, &draw_uniforms);
        // u_model is required, checked above.
        let model_index = model_index.ok_or_else(|| ShaderError::UniformNotFound {
            name: UNIFORM_MODEL.to_owned(),
        })?;

        // Group 2, only when the program samples.
        let texture_slots: Vec<TextureSlot> = linked.textures.values().copied().collect();
        let texture_layout = if texture_slots.is_empty() {
            None
        } else {
            let entries: Vec<_> = texture_slots
                .iter()
                .map(|slot| wgpu::BindGroupLayoutEntry {
                    binding: slot.binding,
                    visibility: slot.stages,
                    ty: match slot.kind {
                        BindingKind::Texture2d => wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        BindingKind::Sampler => {
                            wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering)
                        }
                    },
                    count: None,
                })
                .collect();
            Some(device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("texture bind group layout"),
                entries: &entries,
            }))
        };

        let mut group_layouts = vec![&frame_layout, &draw_layout];
        if let Some(layout) = &texture_layout {
            group_layouts.push(layout);
        }
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("frame renderer pipeline layout"),
            bind_group_layouts: &group_layouts,
            push_constant_ranges: &[],
        });

        device::end_alloc_scope(device, "frame renderer uniforms")?;

        let white = match &texture_layout {
            Some(layout) => {
                let tex = Texture::white(device, queue)?;
                let bind_group = make_texture_bind_group(device, layout, &texture_slots, &tex);
                Some((tex, bind_group))
            }
            None => None,
        };

        Ok(FrameRenderer {
            program,
            format,
            pipeline_layout,
            pipelines: Vec::new(),
            frame_uniforms,
            frame_bind_group,
            draw_layout,
            draw_uniforms,
            draw_bind_group,
            draw_capacity: INITIAL_DRAW_CAPACITY,
            model_index,
            tint_index,
            tex_transform_index,
            texture_layout,
            texture_slots,
            texture_bind_groups: HashMap::new(),
            white,
        })
    }

    pub fn program(&self) -> &CompiledProgram {
        &self.program
    }

    /// Validates a mesh layout against the program and builds its pipeline,
    /// so a layout/shader mismatch fails here rather than on first draw.
    pub fn prepare_layout(
        &mut self,
        device: &wgpu::Device,
        layout: &VertexLayout,
    ) -> Result<(), RenderError> {
        self.ensure_pipeline(device, layout).map(|_| ())
    }

    /// Writes a per-frame uniform other than the projection (the projection
    /// is written automatically in [`render`](Self::render)).
    pub fn set_frame_uniform(
        &self,
        queue: &wgpu::Queue,
        name: &str,
        bytes: &[u8],
    ) -> Result<(), RenderError> {
        let uniform = self
            .frame_uniforms
            .iter()
            .find(|u| u.name == name)
            .ok_or_else(|| ShaderError::UniformNotFound { name: name.to_owned() })?;
        debug_assert_eq!(bytes.len() as u32, uniform.slot.size);
        queue.write_buffer(&uniform.buffer, 0, bytes);
        Ok(())
    }

    /// Records one pass drawing `draws` in order into the target.
    ///
    /// Resource mutations (arena growth, pipeline and bind-group creation,
    /// uniform writes) all happen before the pass opens; the pass itself
    /// only binds and draws. Safe to call with an empty list to clear.
    pub fn render(
        &mut self,
        ctx: &RenderCtx<'_>,
        target: &mut RenderTarget<'_>,
        load: PassLoad,
        draws: &[DrawItem<'_>],
    ) -> Result<(), RenderError> {
        self.ensure_draw_capacity(ctx.device, draws.len() as u32)?;
        for item in draws {
            self.ensure_pipeline(ctx.device, item.mesh.layout())?;
            if let Some(texture) = item.texture {
                self.ensure_texture_bind_group(ctx.device, texture);
            }
        }

        let projection = Mat3::projection(ctx.viewport).to_uniform();
        self.set_frame_uniform(
            ctx.queue,
            UNIFORM_PROJECTION,
            bytemuck::cast_slice(&projection),
        )?;

        for (i, item) in draws.iter().enumerate() {
            let model = &self.draw_uniforms[self.model_index];
            ctx.queue.write_buffer(
                &model.buffer,
                u64::from(model.stride) * i as u64,
                bytemuck::cast_slice(&item.instance.model_matrix().to_uniform()),
            );
            if let Some(tint_index) = self.tint_index {
                let tint = &self.draw_uniforms[tint_index];
                ctx.queue.write_buffer(
                    &tint.buffer,
                    u64::from(tint.stride) * i as u64,
                    bytemuck::cast_slice(&item.tint.to_array()),
                );
            }
            if let Some(tex_index) = self.tex_transform_index {
                let tex = &self.draw_uniforms[tex_index];
                ctx.queue.write_buffer(
                    &tex.buffer,
                    u64::from(tex.stride) * i as u64,
                    bytemuck::cast_slice(&item.uv_transform.to_uniform()),
                );
            }
        }

        let mut pass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("frame renderer pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: match load {
                        PassLoad::Clear(color) => wgpu::LoadOp::Clear(color.into()),
                        PassLoad::Keep => wgpu::LoadOp::Load,
                    },
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_bind_group(FRAME_GROUP, &self.frame_bind_group, &[]);

        let mut bound_layout: Option<&VertexLayout> = None;
        for (i, item) in draws.iter().enumerate() {
            let layout = item.mesh.layout();
            if bound_layout != Some(layout) {
                // Pipeline exists: ensured above.
                let pipeline = self
                    .pipelines
                    .iter()
                    .find(|(l, _)| l == layout)
                    .map(|(_, p)| p)
                    .ok_or_else(|| RenderError::LayoutMismatch {
                        detail: "pipeline missing for prepared layout".to_owned(),
                    })?;
                pass.set_pipeline(pipeline);
                bound_layout = Some(layout);
            }

            let offsets: Vec<u32> = self
                .draw_uniforms
                .iter()
                .map(|u| u.stride * i as u32)
                .collect();
            pass.set_bind_group(DRAW_GROUP, &self.draw_bind_group, &offsets);

            if self.texture_layout.is_some() {
                let bind_group = match item.texture {
                    Some(texture) => self
                        .texture_bind_groups
                        .get(&texture.id())
                        .unwrap_or_else(|| self.white_bind_group()),
                    None => self.white_bind_group(),
                };
                pass.set_bind_group(TEXTURE_GROUP, bind_group, &[]);
            }

            pass.set_vertex_buffer(0, item.mesh.vertex_buffer().slice(..));
            pass.set_index_buffer(item.mesh.index_buffer().slice(..), wgpu::IndexFormat::Uint16);
            pass.draw_indexed(0..item.mesh.index_count(), 0, 0..1);
        }

        Ok(())
    }

    fn white_bind_group(&self) -> &wgpu::BindGroup {
        // texture_layout.is_some() implies white was built in new().
        &self
            .white
            .as_ref()
            .expect("sampling program always has a fallback texture")
            .1
    }

    fn ensure_draw_capacity(&mut self, device: &wgpu::Device, needed: u32) -> Result<(), RenderError> {
        if needed <= self.draw_capacity {
            return Ok(());
        }
        let capacity = needed.next_power_of_two().max(INITIAL_DRAW_CAPACITY);
        log::debug!(
            "growing per-draw uniform arenas: {} -> {capacity} regions",
            self.draw_capacity
        );

        device::begin_alloc_scope(device);
        for uniform in &mut self.draw_uniforms {
            uniform.buffer = make_draw_arena(device, "per-draw", uniform.stride, capacity);
        }
        self.draw_bind_group = make_draw_bind_group(device, &self.draw_layout, &self.draw_uniforms);
        device::end_alloc_scope(device, "per-draw uniform arenas")?;

        self.draw_capacity = capacity;
        Ok(())
    }

    fn ensure_texture_bind_group(&mut self, device: &wgpu::Device, texture: &Texture) {
        let Some(layout) = &self.texture_layout else {
            return;
        };
        self.texture_bind_groups.entry(texture.id()).or_insert_with(|| {
            make_texture_bind_group(device, layout, &self.texture_slots, texture)
        });
    }

    fn ensure_pipeline(
        &mut self,
        device: &wgpu::Device,
        layout: &VertexLayout,
    ) -> Result<&wgpu::RenderPipeline, RenderError> {
        if let Some(i) = self.pipelines.iter().position(|(l, _)| l == layout) {
            return Ok(&self.pipelines[i].1);
        }

        validate_layout(&self.program.linked().vertex_inputs, layout)?;

        // Pipeline creation reports failure through the error-scope queue.
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("frame renderer pipeline"),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: self.program.vertex_module(),
                entry_point: Some(&self.program.linked().vertex_entry),
                compilation_options: Default::default(),
                buffers: &[layout.buffer_layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: self.program.fragment_module(),
                entry_point: Some(&self.program.linked().fragment_entry),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        if let Some(e) = pollster::block_on(device.pop_error_scope()) {
            return Err(ShaderError::Link {
                log: format!("pipeline creation failed: {e}"),
            }
            .into());
        }

        self.pipelines.push((layout.clone(), pipeline));
        Ok(&self.pipelines.last().unwrap().1)
    }
}

/// Checks a linked program against the binding-group convention. Device-free:
/// runs on reflection output alone, before any GPU object is created.
///
/// Required: `u_to_ndc` (group 0, mat3) and `u_model` (group 1, mat3).
/// Optional in group 1: `u_tint` (vec4) and `u_tex_transform` (mat3). Any
/// other per-draw uniform, any uniform outside groups 0/1, or a texture
/// binding outside group 2 fails.
fn check_binding_conventions(linked: &LinkedStages) -> Result<(), RenderError> {
    check_slot(
        UNIFORM_PROJECTION,
        linked.require_uniform(UNIFORM_PROJECTION)?,
        FRAME_GROUP,
        MAT3_UNIFORM_SIZE,
    )?;
    check_slot(
        UNIFORM_MODEL,
        linked.require_uniform(UNIFORM_MODEL)?,
        DRAW_GROUP,
        MAT3_UNIFORM_SIZE,
    )?;
    if let Some(tint) = linked.uniform(UNIFORM_TINT) {
        check_slot(UNIFORM_TINT, tint, DRAW_GROUP, VEC4_UNIFORM_SIZE)?;
    }
    if let Some(tex) = linked.uniform(UNIFORM_TEX_TRANSFORM) {
        check_slot(UNIFORM_TEX_TRANSFORM, tex, DRAW_GROUP, MAT3_UNIFORM_SIZE)?;
    }

    for (name, slot) in &linked.uniforms {
        match slot.group {
            FRAME_GROUP => {}
            DRAW_GROUP
                if name == UNIFORM_MODEL
                    || name == UNIFORM_TINT
                    || name == UNIFORM_TEX_TRANSFORM => {}
            DRAW_GROUP => {
                return Err(link_failure(format!(
                    "uniform `{name}` in group {DRAW_GROUP}: only `{UNIFORM_MODEL}`, \
                     `{UNIFORM_TINT}` and `{UNIFORM_TEX_TRANSFORM}` may be per-draw"
                )));
            }
            other => {
                return Err(link_failure(format!(
                    "uniform `{name}` uses group {other}, expected \
                     group {FRAME_GROUP} (per-frame) or {DRAW_GROUP} (per-draw)"
                )));
            }
        }
    }
    for (name, slot) in &linked.textures {
        if slot.group != TEXTURE_GROUP {
            return Err(link_failure(format!(
                "binding `{name}` uses group {}, textures and samplers \
                 belong in group {TEXTURE_GROUP}",
                slot.group
            )));
        }
    }

    Ok(())
}

fn check_slot(
    name: &str,
    slot: &UniformSlot,
    group: u32,
    size: u32,
) -> Result<(), RenderError> {
    if slot.group != group {
        return Err(link_failure(format!(
            "uniform `{name}` must be in group {group}, found group {}",
            slot.group
        )));
    }
    if slot.size != size {
        return Err(link_failure(format!(
            "uniform `{name}` must be {size} bytes, found {}",
            slot.size
        )));
    }
    Ok(())
}

fn link_failure(log: String) -> RenderError {
    RenderError::Shader(ShaderError::Link { log })
}

fn make_draw_arena(device: &wgpu::Device, name: &str, stride: u32, capacity: u32) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(&format!("per-draw uniform arena `{name}`")),
        size: u64::from(stride) * u64::from(capacity),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn make_draw_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    uniforms: &[DrawUniform],
) -> wgpu::BindGroup {
    let entries: Vec<_> = uniforms
        .iter()
        .map(|u| wgpu::BindGroupEntry {
            binding: u.slot.binding,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &u.buffer,
                offset: 0,
                size: NonZeroU64::new(u64::from(u.slot.size)),
            }),
        })
        .collect();
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("per-draw bind group"),
        layout,
        entries: &entries,
    })
}

fn make_texture_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    slots: &[TextureSlot],
    texture: &Texture,
) -> wgpu::BindGroup {
    let entries: Vec<_> = slots
        .iter()
        .map(|slot| wgpu::BindGroupEntry {
            binding: slot.binding,
            resource: match slot.kind {
                BindingKind::Texture2d => wgpu::BindingResource::TextureView(texture.view()),
                BindingKind::Sampler => wgpu::BindingResource::Sampler(texture.sampler()),
            },
        })
        .collect();
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("texture bind group"),
        layout,
        entries: &entries,
    })
}

/// Cross-validates a mesh layout against a program's reflected inputs.
///
/// Every input the program declares must be fed by an attribute at the same
/// location with the same format, fitting inside the stride. Attributes the
/// program ignores are allowed (one mesh can serve several programs) and
/// only logged.
fn validate_layout(inputs: &[VertexInput], layout: &VertexLayout) -> Result<(), RenderError> {
    for input in inputs {
        let attr = layout
            .attributes
            .iter()
            .find(|a| a.shader_location == input.location);
        let Some(attr) = attr else {
            return Err(RenderError::LayoutMismatch {
                detail: format!(
                    "program input `{}` at location {} has no attribute in the layout",
                    input.name, input.location
                ),
            });
        };
        if attr.format != input.format {
            return Err(RenderError::LayoutMismatch {
                detail: format!(
                    "location {}: program input `{}` wants {:?}, layout supplies {:?}",
                    input.location, input.name, input.format, attr.format
                ),
            });
        }
        if attr.offset + attr.format.size() > layout.stride {
            return Err(RenderError::LayoutMismatch {
                detail: format!(
                    "location {}: attribute at offset {} with size {} exceeds stride {}",
                    input.location,
                    attr.offset,
                    attr.format.size(),
                    layout.stride
                ),
            });
        }
    }

    for attr in &layout.attributes {
        if !inputs.iter().any(|i| i.location == attr.shader_location) {
            log::debug!(
                "vertex attribute at location {} is unused by the program",
                attr.shader_location
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::{StageSources, link_stages};

    const VS: &str = r#"
        @group(0) @binding(0) var<uniform> u_to_ndc: mat3x3<f32>;
        @group(1) @binding(0) var<uniform> u_model: mat3x3<f32>;

        @vertex
        fn vs_main(
            @location(0) pos: vec2<f32>,
            @location(1) uv: vec2<f32>,
        ) -> @builtin(position) vec4<f32> {
            let p = u_to_ndc * (u_model * vec3<f32>(pos + uv, 1.0));
            return vec4<f32>(p.xy, 0.0, 1.0);
        }
    "#;
    const FS: &str = r#"
        @fragment
        fn fs_main() -> @location(0) vec4<f32> {
            return vec4<f32>(1.0);
        }
    "#;

    fn reflected_inputs() -> Vec<VertexInput> {
        link_stages(&StageSources {
            vertex: VS,
            fragment: FS,
        })
        .unwrap()
        .vertex_inputs
    }

    // ── layout cross-validation ───────────────────────────────────────────

    #[test]
    fn matching_layout_passes() {
        let layout = VertexLayout::new(
            16,
            wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2].to_vec(),
        );
        validate_layout(&reflected_inputs(), &layout).unwrap();
    }

    #[test]
    fn missing_attribute_is_a_mismatch() {
        let layout = VertexLayout::new(8, wgpu::vertex_attr_array![0 => Float32x2].to_vec());
        let err = validate_layout(&reflected_inputs(), &layout).unwrap_err();
        assert!(matches!(err, RenderError::LayoutMismatch { .. }), "{err}");
    }

    #[test]
    fn format_mismatch_is_rejected() {
        let layout = VertexLayout::new(
            24,
            wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x4].to_vec(),
        );
        let err = validate_layout(&reflected_inputs(), &layout).unwrap_err();
        match err {
            RenderError::LayoutMismatch { detail } => {
                assert!(detail.contains("location 1"), "{detail}");
            }
            other => panic!("expected LayoutMismatch, got {other}"),
        }
    }

    #[test]
    fn attribute_overflowing_stride_is_rejected() {
        // Attributes are laid out for 16 bytes but the stride claims 12.
        let layout = VertexLayout::new(
            12,
            wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2].to_vec(),
        );
        let err = validate_layout(&reflected_inputs(), &layout).unwrap_err();
        assert!(matches!(err, RenderError::LayoutMismatch { .. }), "{err}");
    }

    #[test]
    fn extra_attributes_are_tolerated() {
        // Location 2 exists in the buffer but the program never reads it.
        let layout = VertexLayout::new(
            32,
            wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2, 2 => Float32x4].to_vec(),
        );
        validate_layout(&reflected_inputs(), &layout).unwrap();
    }

    // ── binding conventions ───────────────────────────────────────────────

    fn conventions_of(vertex: &str, fragment: &str) -> Result<(), RenderError> {
        check_binding_conventions(&link_stages(&StageSources { vertex, fragment }).unwrap())
    }

    #[test]
    fn baseline_program_passes_conventions() {
        conventions_of(VS, FS).unwrap();
    }

    #[test]
    fn tex_transform_is_an_accepted_per_draw_uniform() {
        let vs = r#"
            @group(0) @binding(0) var<uniform> u_to_ndc: mat3x3<f32>;
            @group(1) @binding(0) var<uniform> u_model: mat3x3<f32>;
            @group(1) @binding(2) var<uniform> u_tex_transform: mat3x3<f32>;

            @vertex
            fn vs_main(@location(0) pos: vec2<f32>) -> @builtin(position) vec4<f32> {
                let p = u_to_ndc * (u_model * vec3<f32>(pos, 1.0));
                let t = u_tex_transform * vec3<f32>(pos, 1.0);
                return vec4<f32>(p.xy + t.xy * 0.0, 0.0, 1.0);
            }
        "#;
        conventions_of(vs, FS).unwrap();
    }

    #[test]
    fn stray_per_draw_uniform_is_rejected() {
        let vs = r#"
            @group(0) @binding(0) var<uniform> u_to_ndc: mat3x3<f32>;
            @group(1) @binding(0) var<uniform> u_model: mat3x3<f32>;
            @group(1) @binding(2) var<uniform> u_wobble: vec4<f32>;

            @vertex
            fn vs_main(@location(0) pos: vec2<f32>) -> @builtin(position) vec4<f32> {
                let p = u_to_ndc * (u_model * vec3<f32>(pos, 1.0));
                return vec4<f32>(p.xy, 0.0, 1.0) + u_wobble * 0.0;
            }
        "#;
        let err = conventions_of(vs, FS).unwrap_err();
        assert!(matches!(err, RenderError::Shader(ShaderError::Link { .. })), "{err}");
    }

    #[test]
    fn model_outside_the_per_draw_group_is_rejected() {
        let vs = r#"
            @group(0) @binding(0) var<uniform> u_to_ndc: mat3x3<f32>;
            @group(0) @binding(1) var<uniform> u_model: mat3x3<f32>;

            @vertex
            fn vs_main(@location(0) pos: vec2<f32>) -> @builtin(position) vec4<f32> {
                let p = u_to_ndc * (u_model * vec3<f32>(pos, 1.0));
                return vec4<f32>(p.xy, 0.0, 1.0);
            }
        "#;
        let err = conventions_of(vs, FS).unwrap_err();
        assert!(matches!(err, RenderError::Shader(ShaderError::Link { .. })), "{err}");
    }

    #[test]
    fn mis_sized_tex_transform_is_rejected() {
        // vec2 where the convention wants a 48-byte mat3.
        let vs = r#"
            @group(0) @binding(0) var<uniform> u_to_ndc: mat3x3<f32>;
            @group(1) @binding(0) var<uniform> u_model: mat3x3<f32>;
            @group(1) @binding(2) var<uniform> u_tex_transform: vec2<f32>;

            @vertex
            fn vs_main(@location(0) pos: vec2<f32>) -> @builtin(position) vec4<f32> {
                let p = u_to_ndc * (u_model * vec3<f32>(pos + u_tex_transform, 1.0));
                return vec4<f32>(p.xy, 0.0, 1.0);
            }
        "#;
        let err = conventions_of(vs, FS).unwrap_err();
        assert!(matches!(err, RenderError::Shader(ShaderError::Link { .. })), "{err}");
    }

    // ── instance placement ────────────────────────────────────────────────

    #[test]
    fn default_instance_is_identity() {
        assert_eq!(Instance2D::default().model_matrix(), Mat3::IDENTITY);
    }

    #[test]
    fn instance_model_matches_matrix_composition() {
        let instance = Instance2D {
            position: Vec2::new(10.0, -4.0),
            scale: Vec2::new(2.0, 3.0),
            rotation: 0.7,
        };
        assert_eq!(
            instance.model_matrix(),
            Mat3::model(Vec2::new(10.0, -4.0), Vec2::new(2.0, 3.0), 0.7)
        );
    }
}
