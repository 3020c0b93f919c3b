//! The demo application: GPU and UI layers set up lazily on first use, then
//! per frame the scene animates, two renderer passes draw it, and the egui
//! panel goes on top.

use anyhow::Result;
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::Window;

use pictor_engine::coords::{Mat3, Vec2};
use pictor_engine::core::{App, AppControl, FrameCtx};
use pictor_engine::geometry::{Mesh, VertexLayout};
use pictor_engine::paint::Color;
use pictor_engine::render::{DrawItem, FrameRenderer, Instance2D, PassLoad};
use pictor_engine::shader::{CompiledProgram, StageSources};
use pictor_engine::texture::Texture;

use crate::assets;
use crate::panel;
use crate::scene::{Scene, SceneParams};

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct SpriteVertex {
    pos: [f32; 2],
    uv: [f32; 2],
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct ColorVertex {
    pos: [f32; 2],
    color: [f32; 3],
}

const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

/// Unit quad centered at the origin; instances scale it to size.
const SPRITE_VERTICES: [SpriteVertex; 4] = [
    SpriteVertex { pos: [-0.5, -0.5], uv: [0.0, 0.0] },
    SpriteVertex { pos: [0.5, -0.5], uv: [1.0, 0.0] },
    SpriteVertex { pos: [0.5, 0.5], uv: [1.0, 1.0] },
    SpriteVertex { pos: [-0.5, 0.5], uv: [0.0, 1.0] },
];

/// Vertical gradient, darker at the bottom.
const BACKGROUND_VERTICES: [ColorVertex; 4] = [
    ColorVertex { pos: [-0.5, -0.5], color: [0.05, 0.05, 0.10] },
    ColorVertex { pos: [0.5, -0.5], color: [0.05, 0.05, 0.10] },
    ColorVertex { pos: [0.5, 0.5], color: [0.13, 0.16, 0.28] },
    ColorVertex { pos: [-0.5, 0.5], color: [0.13, 0.16, 0.28] },
];

/// GPU-side scene resources, built once against the live surface format.
struct Gfx {
    flat: FrameRenderer,
    sprite: FrameRenderer,
    background: Mesh,
    quad: Mesh,
    sprite_texture: Texture,
}

impl Gfx {
    fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        format: wgpu::TextureFormat,
    ) -> Result<Gfx> {
        let flat_program = CompiledProgram::compile(
            device,
            "flat",
            &StageSources {
                vertex: include_str!("shaders/flat.vert.wgsl"),
                fragment: include_str!("shaders/flat.frag.wgsl"),
            },
        )?;
        let mut flat = FrameRenderer::new(device, queue, flat_program, format)?;

        let sprite_program = CompiledProgram::compile(
            device,
            "sprite",
            &StageSources {
                vertex: include_str!("shaders/sprite.vert.wgsl"),
                fragment: include_str!("shaders/sprite.frag.wgsl"),
            },
        )?;
        let mut sprite = FrameRenderer::new(device, queue, sprite_program, format)?;

        let background = Mesh::upload(
            device,
            "background",
            &BACKGROUND_VERTICES,
            &QUAD_INDICES,
            VertexLayout::of::<ColorVertex>(
                wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x3].to_vec(),
            ),
        )?;
        let quad = Mesh::upload(
            device,
            "sprite quad",
            &SPRITE_VERTICES,
            &QUAD_INDICES,
            VertexLayout::of::<SpriteVertex>(
                wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2].to_vec(),
            ),
        )?;

        // Cross-validate geometry against the programs now, not on first draw.
        flat.prepare_layout(device, background.layout())?;
        sprite.prepare_layout(device, quad.layout())?;

        let sprite_texture = assets::load_sprite_texture(device, queue)?;

        Ok(Gfx {
            flat,
            sprite,
            background,
            quad,
            sprite_texture,
        })
    }
}

/// egui platform state + its wgpu renderer.
struct UiLayer {
    state: egui_winit::State,
    renderer: egui_wgpu::Renderer,
}

impl UiLayer {
    fn new(window: &Window, device: &wgpu::Device, format: wgpu::TextureFormat) -> UiLayer {
        let state = egui_winit::State::new(
            egui::Context::default(),
            egui::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            window.theme(),
            None,
        );
        let renderer =
            egui_wgpu::Renderer::new(device, format, egui_wgpu::RendererOptions::default());
        UiLayer { state, renderer }
    }
}

#[derive(Default)]
pub struct DemoApp {
    params: SceneParams,
    scene: Scene,
    gfx: Option<Gfx>,
    ui: Option<UiLayer>,
}

impl App for DemoApp {
    fn on_window_event(&mut self, window: &Window, event: &WindowEvent) -> AppControl {
        if let Some(ui) = &mut self.ui {
            let response = ui.state.on_window_event(window, event);
            if response.repaint {
                window.request_redraw();
            }
            if response.consumed {
                return AppControl::Continue;
            }
        }

        if let WindowEvent::KeyboardInput { event, .. } = event {
            if event.state == ElementState::Pressed
                && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
            {
                return AppControl::Exit;
            }
        }

        AppControl::Continue
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        if self.gfx.is_none() {
            match Gfx::new(ctx.gpu.device(), ctx.gpu.queue(), ctx.gpu.surface_format()) {
                Ok(gfx) => self.gfx = Some(gfx),
                Err(e) => {
                    log::error!("graphics setup failed: {e:#}");
                    return AppControl::Exit;
                }
            }
        }
        if self.ui.is_none() {
            self.ui = Some(UiLayer::new(
                ctx.window.window,
                ctx.gpu.device(),
                ctx.gpu.surface_format(),
            ));
        }

        self.scene.advance(ctx.time.dt, &self.params);

        let Self { params, scene, gfx, ui } = self;
        let gfx = gfx.as_mut().expect("initialized above");
        let ui = ui.as_mut().expect("initialized above");

        // Run the panel and tessellate before the frame is acquired.
        let window = ctx.window.window;
        let raw_input = ui.state.take_egui_input(window);
        let full_output = ui
            .state
            .egui_ctx()
            .run(raw_input, |ectx| panel::draw(ectx, params));
        let egui::FullOutput {
            platform_output,
            textures_delta,
            shapes,
            pixels_per_point,
            ..
        } = full_output;
        ui.state.handle_platform_output(window, platform_output);
        let primitives = ui.state.egui_ctx().tessellate(shapes, pixels_per_point);

        let placements = scene.placements(params);

        ctx.render(|rctx, target| {
            // Background: unit quad stretched over the whole viewport.
            let bg = DrawItem {
                mesh: &gfx.background,
                instance: Instance2D {
                    scale: Vec2::new(rctx.viewport.width, rctx.viewport.height),
                    ..Instance2D::default()
                },
                tint: Color::WHITE,
                uv_transform: Mat3::IDENTITY,
                texture: None,
            };
            gfx.flat.render(rctx, target, PassLoad::Clear(Color::BLACK), &[bg])?;

            let draws: Vec<DrawItem<'_>> = placements
                .iter()
                .map(|p| DrawItem {
                    mesh: &gfx.quad,
                    instance: p.instance,
                    tint: p.tint,
                    uv_transform: p.uv_transform,
                    texture: Some(&gfx.sprite_texture),
                })
                .collect();
            gfx.sprite.render(rctx, target, PassLoad::Keep, &draws)?;

            // Panel on top of the scene.
            let screen = egui_wgpu::ScreenDescriptor {
                size_in_pixels: [rctx.viewport.width as u32, rctx.viewport.height as u32],
                pixels_per_point,
            };
            for (id, delta) in &textures_delta.set {
                ui.renderer.update_texture(rctx.device, rctx.queue, *id, delta);
            }
            // Staged uploads must land before the frame's encoder is
            // submitted, so they go to the queue here.
            let upload_cmds = ui.renderer.update_buffers(
                rctx.device,
                rctx.queue,
                target.encoder,
                &primitives,
                &screen,
            );
            if !upload_cmds.is_empty() {
                rctx.queue.submit(upload_cmds);
            }
            {
                let pass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("panel pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: target.color_view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                        depth_slice: None,
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                let mut pass = pass.forget_lifetime();
                ui.renderer.render(&mut pass, &primitives, &screen);
            }
            for id in &textures_delta.free {
                ui.renderer.free_texture(id);
            }

            Ok(())
        })
    }
}
