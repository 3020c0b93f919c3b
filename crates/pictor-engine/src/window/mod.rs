//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and the single window, and wires them to the
//! GPU layer.

mod runtime;
mod signal;

pub use runtime::{Runtime, RuntimeConfig, RuntimeCtx};
pub use signal::{WindowSignal, classify};
