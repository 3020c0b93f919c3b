use winit::window::{Window, WindowId};

use crate::coords::Viewport;
use crate::device::{Gpu, SurfaceErrorAction};
use crate::render::{RenderCtx, RenderError, RenderTarget};
use crate::time::FrameTime;
use crate::window::RuntimeCtx;

use super::app::AppControl;

/// Per-window handles and immutable window metadata.
pub struct WindowCtx<'a> {
    pub id: WindowId,
    pub window: &'a Window,
}

/// Per-frame context passed to `core::App::on_frame`.
///
/// Lifetimes:
/// - `'a` is the duration of the callback invocation
/// - `'w` is the window-borrow lifetime carried by `Gpu<'w>`
pub struct FrameCtx<'a, 'w> {
    pub window: WindowCtx<'a>,
    pub gpu: &'a mut Gpu<'w>,
    pub time: FrameTime,
    pub runtime: &'a mut RuntimeCtx,
}

impl<'a, 'w> FrameCtx<'a, 'w> {
    /// Acquires a frame, calls `draw` with a ready [`RenderCtx`] and
    /// [`RenderTarget`], then submits and presents.
    ///
    /// Clearing is not done here: the first renderer pass of the frame
    /// decides the load behavior, so several passes can compose on one
    /// target. A failed `draw` logs the error and exits; setup-fatal errors
    /// have no recovery path once the scene is supposed to be live.
    ///
    /// Surface errors are absorbed per [`Gpu::handle_surface_error`]: the
    /// frame is skipped (or the surface reconfigured) and only out-of-memory
    /// terminates.
    pub fn render<F>(&mut self, draw: F) -> AppControl
    where
        F: FnOnce(&RenderCtx<'_>, &mut RenderTarget<'_>) -> Result<(), RenderError>,
    {
        let size = self.gpu.size();
        if size.width == 0 || size.height == 0 {
            // Minimized; nothing to draw into.
            return AppControl::Continue;
        }

        let mut frame = match self.gpu.begin_frame() {
            Ok(f) => f,
            Err(err) => {
                log::warn!("surface frame acquisition failed: {err}");
                return match self.gpu.handle_surface_error(err) {
                    SurfaceErrorAction::Fatal => AppControl::Exit,
                    SurfaceErrorAction::Reconfigured | SurfaceErrorAction::SkipFrame => {
                        AppControl::Continue
                    }
                };
            }
        };

        // Debug builds trap validation errors per frame instead of relying
        // on wgpu's uncaptured-error hook.
        if cfg!(debug_assertions) {
            self.gpu.device().push_error_scope(wgpu::ErrorFilter::Validation);
        }

        let rctx = RenderCtx::new(
            self.gpu.device(),
            self.gpu.queue(),
            self.gpu.surface_format(),
            Viewport::new(size.width as f32, size.height as f32),
        );

        // RenderTarget borrows frame.encoder; dropped before submit() takes frame.
        let drawn = {
            let mut target = RenderTarget::new(&mut frame.encoder, &frame.view);
            draw(&rctx, &mut target)
        };

        if let Err(e) = drawn {
            if cfg!(debug_assertions) {
                let _ = pollster::block_on(self.gpu.device().pop_error_scope());
            }
            log::error!("frame rendering failed: {e}");
            return AppControl::Exit;
        }

        self.window.window.pre_present_notify();
        self.gpu.submit(frame);

        if cfg!(debug_assertions) {
            if let Some(e) = pollster::block_on(self.gpu.device().pop_error_scope()) {
                log::error!("validation error during frame {}: {e}", self.time.frame_index);
            }
        }

        AppControl::Continue
    }
}
