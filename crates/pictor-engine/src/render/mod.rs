//! GPU rendering core.
//!
//! `FrameRenderer` drives one compiled program: it owns the reflection-built
//! bind group layouts, the per-frame and per-draw uniform storage, and a
//! per-vertex-layout pipeline cache, and issues the indexed draw calls for a
//! frame's drawable instances.
//!
//! Convention:
//! - Scene geometry is in pixel-centered device coordinates (origin at the
//!   viewport center); the vertex stage converts to NDC via the `u_to_ndc`
//!   projection uniform.
//! - Bind groups: group 0 per-frame, group 1 per-draw (dynamic offsets),
//!   group 2 texture + sampler.

mod ctx;
mod frame;

use thiserror::Error;

use crate::shader::ShaderError;

pub use ctx::{RenderCtx, RenderTarget};
pub use frame::{
    DRAW_GROUP, DrawItem, FRAME_GROUP, FrameRenderer, Instance2D, PassLoad, TEXTURE_GROUP,
    UNIFORM_MODEL, UNIFORM_PROJECTION, UNIFORM_TEX_TRANSFORM, UNIFORM_TINT,
};

/// Rendering-core errors. All are setup-fatal: no per-frame error is
/// recoverable mid-frame.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Shader(#[from] ShaderError),

    /// Startup-time cross-validation caught a geometry layout that does not
    /// agree with the program's declared vertex inputs.
    #[error("vertex layout does not match program inputs: {detail}")]
    LayoutMismatch { detail: String },

    /// Device out of memory or handles. No retry policy.
    #[error("GPU resource allocation failed: {0}")]
    Allocation(String),
}
