//! Demo binary: an animated sprite scene with a live parameter panel.

mod app;
mod assets;
mod panel;
mod scene;

use anyhow::Result;
use winit::dpi::LogicalSize;

use pictor_engine::device::GpuInit;
use pictor_engine::logging::{LoggingConfig, init_logging};
use pictor_engine::window::{Runtime, RuntimeConfig};

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    Runtime::run(
        RuntimeConfig {
            title: "pictor demo".to_string(),
            initial_size: LogicalSize::new(1280.0, 720.0),
        },
        GpuInit::default(),
        app::DemoApp::default(),
    )
}
