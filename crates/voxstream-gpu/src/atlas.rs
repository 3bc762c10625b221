use glam::UVec2;
use std::sync::Arc;
use voxstream_cache::{AtlasBackend, AtlasDescriptor};
use voxstream_core::TextureFormat;

/// GPU texture format backing an atlas of the given texel layout.
/// There is no three-channel 8-bit format, so RGB atlases are stored as RGBA.
pub fn gpu_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Luminance => wgpu::TextureFormat::R8Uint,
        TextureFormat::LuminanceAlpha => wgpu::TextureFormat::Rg8Uint,
        TextureFormat::Rgb | TextureFormat::Rgba => wgpu::TextureFormat::Rgba8Uint,
    }
}

/// Bytes per texel of the GPU-side texture for `format`.
pub fn gpu_bytes_per_texel(format: TextureFormat) -> u32 {
    match format {
        TextureFormat::Luminance => 1,
        TextureFormat::LuminanceAlpha => 2,
        TextureFormat::Rgb | TextureFormat::Rgba => 4,
    }
}

/// Append `rgb` texels to `out` as RGBA with opaque alpha.
pub fn expand_rgb_to_rgba(rgb: &[u8], out: &mut Vec<u8>) {
    out.reserve(rgb.len() / 3 * 4);
    for texel in rgb.chunks_exact(3) {
        out.extend_from_slice(texel);
        out.push(u8::MAX);
    }
}

/// One data texture atlas on the GPU.
pub struct GpuAtlas {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl GpuAtlas {
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

/// Atlas backend writing bucket payloads straight into wgpu textures.
pub struct WgpuAtlasBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    /// Reused for RGB -> RGBA expansion.
    scratch: Vec<u8>,
}

impl WgpuAtlasBackend {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self {
            device,
            queue,
            scratch: Vec::new(),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}

impl AtlasBackend for WgpuAtlasBackend {
    type Texture = GpuAtlas;

    fn create_atlas(&mut self, desc: &AtlasDescriptor) -> GpuAtlas {
        let max_dim = self.device.limits().max_texture_dimension_2d;
        if desc.width > max_dim || desc.height > max_dim {
            log::warn!(
                "Atlas {}: {}x{} exceeds the device limit of {} texels per side",
                desc.layer,
                desc.width,
                desc.height,
                max_dim
            );
        }

        let format = gpu_format(desc.format);
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("bucket-data-atlas"),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        log::info!(
            "Atlas {}: {}x{} {:?}, {} MB",
            desc.layer,
            desc.width,
            desc.height,
            format,
            desc.width as u64 * desc.height as u64 * gpu_bytes_per_texel(desc.format) as u64
                / (1024 * 1024)
        );
        GpuAtlas { texture, view }
    }

    fn write_region(
        &mut self,
        texture: &mut GpuAtlas,
        desc: &AtlasDescriptor,
        origin: UVec2,
        size: UVec2,
        bytes: &[u8],
    ) {
        let data: &[u8] = match desc.format {
            TextureFormat::Rgb => {
                self.scratch.clear();
                expand_rgb_to_rgba(bytes, &mut self.scratch);
                &self.scratch
            }
            TextureFormat::Luminance | TextureFormat::LuminanceAlpha | TextureFormat::Rgba => {
                bytes
            }
        };

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: origin.x,
                    y: origin.y,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(size.x * gpu_bytes_per_texel(desc.format)),
                rows_per_image: Some(size.y),
            },
            wgpu::Extent3d {
                width: size.x,
                height: size.y,
                depth_or_array_layers: 1,
            },
        );
    }
}
