//! End-to-end draw test against a real adapter, rendering to an offscreen
//! target and reading the pixels back. Skips (with a note) when the host has
//! no usable GPU.

use pictor_engine::coords::{Mat3, Vec2, Viewport};
use pictor_engine::geometry::{Mesh, VertexLayout};
use pictor_engine::paint::Color;
use pictor_engine::render::{
    DrawItem, FrameRenderer, Instance2D, PassLoad, RenderCtx, RenderError, RenderTarget,
};
use pictor_engine::shader::{CompiledProgram, StageSources};
use pictor_engine::texture::{SamplerOptions, Texture};

const VS: &str = r#"
    struct VsIn {
        @location(0) pos: vec2<f32>,
        @location(1) uv: vec2<f32>,
    }
    struct VsOut {
        @builtin(position) clip: vec4<f32>,
        @location(0) uv: vec2<f32>,
    }

    @group(0) @binding(0) var<uniform> u_to_ndc: mat3x3<f32>;
    @group(1) @binding(0) var<uniform> u_model: mat3x3<f32>;

    @vertex
    fn vs_main(in: VsIn) -> VsOut {
        let p = u_to_ndc * (u_model * vec3<f32>(in.pos, 1.0));
        var out: VsOut;
        out.clip = vec4<f32>(p.xy, 0.0, 1.0);
        out.uv = in.uv;
        return out;
    }
"#;

const FS: &str = r#"
    @group(1) @binding(1) var<uniform> u_tint: vec4<f32>;
    @group(2) @binding(0) var t_color: texture_2d<f32>;
    @group(2) @binding(1) var s_color: sampler;

    @fragment
    fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
        return textureSample(t_color, s_color, uv) * u_tint;
    }
"#;

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    pos: [f32; 2],
    uv: [f32; 2],
}

fn quad_vertices() -> Vec<Vertex> {
    vec![
        Vertex { pos: [-0.5, -0.5], uv: [0.0, 0.0] },
        Vertex { pos: [0.5, -0.5], uv: [1.0, 0.0] },
        Vertex { pos: [0.5, 0.5], uv: [1.0, 1.0] },
        Vertex { pos: [-0.5, 0.5], uv: [0.0, 1.0] },
    ]
}

const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

fn quad_layout() -> VertexLayout {
    VertexLayout::of::<Vertex>(wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2].to_vec())
}

fn acquire_device() -> Option<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let adapter = match pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::default(),
        compatible_surface: None,
        force_fallback_adapter: false,
    })) {
        Ok(a) => a,
        Err(_) => {
            eprintln!("no GPU adapter available, skipping");
            return None;
        }
    };

    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("draw_e2e device"),
        required_features: wgpu::Features::empty(),
        required_limits: wgpu::Limits::default(),
        experimental_features: wgpu::ExperimentalFeatures::disabled(),
        memory_hints: wgpu::MemoryHints::Performance,
        trace: wgpu::Trace::Off,
    }))
    .expect("adapter exists but device creation failed");

    Some((device, queue))
}

/// Non-sRGB so readback bytes equal the written values exactly.
const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const TARGET_SIZE: u32 = 2;
// COPY_BYTES_PER_ROW_ALIGNMENT padded row for a 2-pixel-wide copy.
const PADDED_ROW: u32 = 256;

fn make_target(device: &wgpu::Device) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("offscreen target"),
        size: wgpu::Extent3d {
            width: TARGET_SIZE,
            height: TARGET_SIZE,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TARGET_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

/// Returns the 4 target pixels as RGBA byte quadruples, row-major.
fn read_back(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
) -> Vec<[u8; 4]> {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("readback"),
        size: u64::from(PADDED_ROW) * u64::from(TARGET_SIZE),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder =
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(PADDED_ROW),
                rows_per_image: Some(TARGET_SIZE),
            },
        },
        wgpu::Extent3d {
            width: TARGET_SIZE,
            height: TARGET_SIZE,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let (tx, rx) = std::sync::mpsc::channel();
    buffer.slice(..).map_async(wgpu::MapMode::Read, move |result| {
        tx.send(result).expect("map callback after test ended");
    });
    device
        .poll(wgpu::PollType::wait_indefinitely())
        .expect("device poll failed");
    rx.recv().expect("map callback dropped").expect("buffer map failed");

    let data = buffer.slice(..).get_mapped_range();
    let mut pixels = Vec::new();
    for row in 0..TARGET_SIZE {
        let start = (row * PADDED_ROW) as usize;
        for col in 0..TARGET_SIZE {
            let p = start + (col * 4) as usize;
            pixels.push([data[p], data[p + 1], data[p + 2], data[p + 3]]);
        }
    }
    pixels
}

fn viewport() -> Viewport {
    Viewport::new(TARGET_SIZE as f32, TARGET_SIZE as f32)
}

#[test]
fn tinted_quad_covers_the_whole_target() {
    let Some((device, queue)) = acquire_device() else {
        return;
    };

    let program = CompiledProgram::compile(
        &device,
        "sprite",
        &StageSources { vertex: VS, fragment: FS },
    )
    .unwrap();
    let mut renderer = FrameRenderer::new(&device, &queue, program, TARGET_FORMAT).unwrap();

    let mesh = Mesh::upload(&device, "quad", &quad_vertices(), &QUAD_INDICES, quad_layout())
        .unwrap();

    let (texture, view) = make_target(&device);
    let ctx = RenderCtx::new(&device, &queue, TARGET_FORMAT, viewport());

    let mut encoder =
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    {
        let mut target = RenderTarget::new(&mut encoder, &view);
        // Unit quad scaled to the full 2×2-pixel viewport; no bound texture,
        // so the white fallback makes the tint the output color.
        renderer
            .render(
                &ctx,
                &mut target,
                PassLoad::Clear(Color::rgb(0.0, 0.0, 1.0)),
                &[DrawItem {
                    mesh: &mesh,
                    instance: Instance2D {
                        position: Vec2::zero(),
                        scale: Vec2::splat(2.0),
                        rotation: 0.0,
                    },
                    tint: Color::rgb(1.0, 0.0, 0.0),
                    uv_transform: Mat3::IDENTITY,
                    texture: None,
                }],
            )
            .unwrap();
    }
    queue.submit(std::iter::once(encoder.finish()));

    for (i, pixel) in read_back(&device, &queue, &texture).iter().enumerate() {
        assert_eq!(*pixel, [255, 0, 0, 255], "pixel {i} not tinted");
    }
}

#[test]
fn empty_draw_list_still_clears() {
    let Some((device, queue)) = acquire_device() else {
        return;
    };

    let program = CompiledProgram::compile(
        &device,
        "sprite",
        &StageSources { vertex: VS, fragment: FS },
    )
    .unwrap();
    let mut renderer = FrameRenderer::new(&device, &queue, program, TARGET_FORMAT).unwrap();

    let (texture, view) = make_target(&device);
    let ctx = RenderCtx::new(&device, &queue, TARGET_FORMAT, viewport());

    let mut encoder =
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    {
        let mut target = RenderTarget::new(&mut encoder, &view);
        renderer
            .render(&ctx, &mut target, PassLoad::Clear(Color::rgb(0.0, 0.0, 1.0)), &[])
            .unwrap();
    }
    queue.submit(std::iter::once(encoder.finish()));

    for (i, pixel) in read_back(&device, &queue, &texture).iter().enumerate() {
        assert_eq!(*pixel, [0, 0, 255, 255], "pixel {i} not cleared");
    }
}

#[test]
fn out_of_convention_uniform_fails_renderer_construction() {
    let Some((device, queue)) = acquire_device() else {
        return;
    };

    // u_model belongs in the per-draw group; group 0 must not link.
    let vs = r#"
        @group(0) @binding(0) var<uniform> u_to_ndc: mat3x3<f32>;
        @group(0) @binding(1) var<uniform> u_model: mat3x3<f32>;

        @vertex
        fn vs_main(@location(0) pos: vec2<f32>) -> @builtin(position) vec4<f32> {
            let p = u_to_ndc * (u_model * vec3<f32>(pos, 1.0));
            return vec4<f32>(p.xy, 0.0, 1.0);
        }
    "#;
    let fs = r#"
        @fragment
        fn fs_main() -> @location(0) vec4<f32> {
            return vec4<f32>(1.0);
        }
    "#;

    let program =
        CompiledProgram::compile(&device, "bad", &StageSources { vertex: vs, fragment: fs })
            .unwrap();
    match FrameRenderer::new(&device, &queue, program, TARGET_FORMAT) {
        Err(err) => assert!(matches!(err, RenderError::Shader(_)), "{err}"),
        Ok(_) => panic!("out-of-convention uniform was accepted"),
    }
}

#[test]
fn uv_transform_selects_the_sampled_region() {
    let Some((device, queue)) = acquire_device() else {
        return;
    };

    // Reads u_tex_transform per draw; the uv window picks the sheet cell.
    let vs = r#"
        struct VsOut {
            @builtin(position) clip: vec4<f32>,
            @location(0) uv: vec2<f32>,
        }

        @group(0) @binding(0) var<uniform> u_to_ndc: mat3x3<f32>;
        @group(1) @binding(0) var<uniform> u_model: mat3x3<f32>;
        @group(1) @binding(2) var<uniform> u_tex_transform: mat3x3<f32>;

        @vertex
        fn vs_main(@location(0) pos: vec2<f32>, @location(1) uv: vec2<f32>) -> VsOut {
            let p = u_to_ndc * (u_model * vec3<f32>(pos, 1.0));
            var out: VsOut;
            out.clip = vec4<f32>(p.xy, 0.0, 1.0);
            out.uv = (u_tex_transform * vec3<f32>(uv, 1.0)).xy;
            return out;
        }
    "#;
    let fs = r#"
        @group(2) @binding(0) var t_color: texture_2d<f32>;
        @group(2) @binding(1) var s_color: sampler;

        @fragment
        fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
            return textureSample(t_color, s_color, uv);
        }
    "#;

    let program =
        CompiledProgram::compile(&device, "sheet", &StageSources { vertex: vs, fragment: fs })
            .unwrap();
    let mut renderer = FrameRenderer::new(&device, &queue, program, TARGET_FORMAT).unwrap();

    let mesh = Mesh::upload(&device, "quad", &quad_vertices(), &QUAD_INDICES, quad_layout())
        .unwrap();

    // Two-cell sheet: left red, right green.
    let sheet = Texture::from_rgba8(
        &device,
        &queue,
        "sheet",
        2,
        1,
        &[255, 0, 0, 255, 0, 255, 0, 255],
        SamplerOptions::default(),
    )
    .unwrap();

    let (texture, view) = make_target(&device);
    let ctx = RenderCtx::new(&device, &queue, TARGET_FORMAT, viewport());

    let mut encoder =
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    {
        let mut target = RenderTarget::new(&mut encoder, &view);
        // uv window [0.5, 1] × [0, 1]: every sample lands in the green cell.
        renderer
            .render(
                &ctx,
                &mut target,
                PassLoad::Clear(Color::BLACK),
                &[DrawItem {
                    mesh: &mesh,
                    instance: Instance2D {
                        position: Vec2::zero(),
                        scale: Vec2::splat(2.0),
                        rotation: 0.0,
                    },
                    tint: Color::WHITE,
                    uv_transform: Mat3::model(Vec2::new(0.5, 0.0), Vec2::new(0.5, 1.0), 0.0),
                    texture: Some(&sheet),
                }],
            )
            .unwrap();
    }
    queue.submit(std::iter::once(encoder.finish()));

    for (i, pixel) in read_back(&device, &queue, &texture).iter().enumerate() {
        assert_eq!(*pixel, [0, 255, 0, 255], "pixel {i} outside the green cell");
    }
}

#[test]
fn incompatible_mesh_layout_is_rejected_at_setup() {
    let Some((device, queue)) = acquire_device() else {
        return;
    };

    let program = CompiledProgram::compile(
        &device,
        "sprite",
        &StageSources { vertex: VS, fragment: FS },
    )
    .unwrap();
    let mut renderer = FrameRenderer::new(&device, &queue, program, TARGET_FORMAT).unwrap();

    // Position only; the program also wants uv at location 1.
    let bare = VertexLayout::new(8, wgpu::vertex_attr_array![0 => Float32x2].to_vec());
    let err = renderer.prepare_layout(&device, &bare).unwrap_err();
    assert!(matches!(err, RenderError::LayoutMismatch { .. }), "{err}");
}
