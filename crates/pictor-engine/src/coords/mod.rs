//! Coordinate and transform types.
//!
//! Convention:
//! - Scene positions are in pixel-centered device coordinates (origin at the
//!   viewport center, +Y up).
//! - The projection matrix maps them to NDC; the model matrix composes
//!   scale → rotate → translate per instance.

mod mat3;
mod vec2;
mod viewport;

pub use mat3::Mat3;
pub use vec2::Vec2;
pub use viewport::Viewport;
