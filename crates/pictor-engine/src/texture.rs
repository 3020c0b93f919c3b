//! Texture decode + GPU upload.
//!
//! Decoding is a thin call into `image`; the decoded pixel buffer lives only
//! for the duration of the upload and is dropped afterwards. The GPU objects
//! (texture, view, sampler) are owned and released on drop.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use crate::device;
use crate::render::RenderError;

#[derive(Debug, Error)]
pub enum TextureError {
    #[error("failed to decode image `{path}`: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error(transparent)]
    Allocation(#[from] RenderError),
}

/// Sampling behavior for a texture.
///
/// Defaults match pixel-art sprites: nearest filtering, repeat wrapping.
#[derive(Debug, Copy, Clone)]
pub struct SamplerOptions {
    pub filter: wgpu::FilterMode,
    pub wrap: wgpu::AddressMode,
}

impl Default for SamplerOptions {
    fn default() -> Self {
        Self {
            filter: wgpu::FilterMode::Nearest,
            wrap: wgpu::AddressMode::Repeat,
        }
    }
}

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

/// An uploaded RGBA texture with its view and sampler.
pub struct Texture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    width: u32,
    height: u32,
    /// Process-unique identity, used by the renderer's bind-group cache.
    id: u64,
}

impl Texture {
    /// Decodes an image file and uploads it.
    ///
    /// `flip_vertically` accounts for sources whose rows are stored
    /// top-down relative to the texture-coordinate origin.
    pub fn from_path(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        path: &Path,
        flip_vertically: bool,
    ) -> Result<Texture, TextureError> {
        let img = image::open(path).map_err(|source| TextureError::Decode {
            path: path.display().to_string(),
            source,
        })?;

        let img = if flip_vertically { img.flipv() } else { img };
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();

        let label = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "texture".to_owned());

        Ok(Self::from_rgba8(
            device,
            queue,
            &label,
            width,
            height,
            &rgba,
            SamplerOptions::default(),
        )?)
    }

    /// Uploads raw row-major RGBA8 pixels.
    pub fn from_rgba8(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        width: u32,
        height: u32,
        pixels: &[u8],
        options: SamplerOptions,
    ) -> Result<Texture, RenderError> {
        debug_assert_eq!(pixels.len() as u32, width * height * 4);

        device::begin_alloc_scope(device);

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: options.wrap,
            address_mode_v: options.wrap,
            address_mode_w: options.wrap,
            mag_filter: options.filter,
            min_filter: options.filter,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        device::end_alloc_scope(device, label)?;

        Ok(Texture {
            texture,
            view,
            sampler,
            width,
            height,
            id: NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed),
        })
    }

    /// 1×1 opaque white, the fallback bound for untextured draws so tint
    /// alone determines the output color.
    pub fn white(device: &wgpu::Device, queue: &wgpu::Queue) -> Result<Texture, RenderError> {
        Self::from_rgba8(
            device,
            queue,
            "white fallback",
            1,
            1,
            &[0xFF, 0xFF, 0xFF, 0xFF],
            SamplerOptions::default(),
        )
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}
