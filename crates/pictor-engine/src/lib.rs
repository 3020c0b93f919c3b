//! Pictor engine crate.
//!
//! Owns the platform + GPU runtime pieces and the 2D rendering core:
//! shader compilation and reflection, geometry upload, transform math,
//! and the per-frame draw protocol.

pub mod device;
pub mod window;
pub mod time;
pub mod core;

pub mod logging;
pub mod coords;
pub mod paint;
pub mod shader;
pub mod geometry;
pub mod texture;
pub mod render;
