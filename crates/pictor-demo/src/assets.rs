//! Asset lookup and the generated fallback sprite.

use std::path::PathBuf;

use anyhow::Result;

use pictor_engine::texture::{SamplerOptions, Texture};

/// Searches the usual spots for a bundled asset: next to the working
/// directory, next to the executable, and the source tree for `cargo run`.
pub fn find(name: &str) -> Option<PathBuf> {
    let mut candidates = vec![PathBuf::from("assets").join(name)];

    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            candidates.push(dir.join("assets").join(name));
        }
    }

    candidates.push(
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("assets")
            .join(name),
    );

    candidates.into_iter().find(|p| p.is_file())
}

/// Loads the demo sprite, falling back to a generated checkerboard when the
/// PNG is absent or undecodable. The demo must come up either way.
pub fn load_sprite_texture(device: &wgpu::Device, queue: &wgpu::Queue) -> Result<Texture> {
    if let Some(path) = find("sprite.png") {
        match Texture::from_path(device, queue, &path, true) {
            Ok(texture) => return Ok(texture),
            Err(e) => log::warn!("failed to load `{}`: {e}", path.display()),
        }
    }

    log::info!("using generated checkerboard sprite");
    let size = 64;
    let pixels = checkerboard_pixels(size, 8);
    Ok(Texture::from_rgba8(
        device,
        queue,
        "checkerboard sprite",
        size,
        size,
        &pixels,
        SamplerOptions::default(),
    )?)
}

/// `size`×`size` RGBA checkerboard with `cell`-pixel squares. Light squares
/// take a per-quadrant hue, so sheet-cell cycling stays visible on the
/// generated fallback.
fn checkerboard_pixels(size: u32, cell: u32) -> Vec<u8> {
    const LIGHT: [[u8; 3]; 4] = [
        [0xE8, 0xE8, 0xF0],
        [0xF0, 0xC0, 0xA8],
        [0xA8, 0xF0, 0xC0],
        [0xB0, 0xC8, 0xF0],
    ];
    let half = (size / 2).max(1);
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let dark = ((x / cell) + (y / cell)) % 2 == 0;
            if dark {
                pixels.extend_from_slice(&[0x30, 0x30, 0x38, 0xFF]);
            } else {
                let quadrant = ((y / half) * 2 + (x / half)) as usize % LIGHT.len();
                pixels.extend_from_slice(&LIGHT[quadrant]);
                pixels.push(0xFF);
            }
        }
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkerboard_has_expected_dimensions() {
        assert_eq!(checkerboard_pixels(64, 8).len(), 64 * 64 * 4);
    }

    #[test]
    fn checkerboard_alternates_cells() {
        let pixels = checkerboard_pixels(16, 8);
        let at = |x: u32, y: u32| {
            let i = ((y * 16 + x) * 4) as usize;
            [pixels[i], pixels[i + 1], pixels[i + 2]]
        };
        assert_eq!(at(0, 0), at(15, 15));
        assert_ne!(at(0, 0), at(8, 0));
        assert_ne!(at(0, 0), at(0, 8));
    }

    #[test]
    fn checkerboard_quadrants_are_distinguishable() {
        // Light squares in different quadrants carry different hues.
        let pixels = checkerboard_pixels(16, 8);
        let at = |x: u32, y: u32| {
            let i = ((y * 16 + x) * 4) as usize;
            [pixels[i], pixels[i + 1], pixels[i + 2]]
        };
        assert_ne!(at(8, 0), at(0, 8));
    }
}
