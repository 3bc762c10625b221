use glam::UVec2;
use voxstream_core::math::slot_region;
use voxstream_core::TextureFormat;

/// Parameters of one data texture atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasDescriptor {
    /// Index of this atlas among the manager's data textures.
    pub layer: u32,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    /// Texels per bucket slot.
    pub packed_bucket_size: u32,
}

impl AtlasDescriptor {
    pub fn byte_size(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.format.channel_count() as u64
    }

    /// Texel rectangle (origin, size) of `slot`.
    pub fn slot_region(&self, slot: u32) -> (UVec2, UVec2) {
        slot_region(slot, self.packed_bucket_size, self.width)
    }
}

/// Storage for atlas textures. The manager owns one backend and the textures
/// it creates; renderers only read them.
pub trait AtlasBackend {
    type Texture;

    fn create_atlas(&mut self, desc: &AtlasDescriptor) -> Self::Texture;

    /// Write tightly packed texel `bytes` into the rectangle at `origin` of `size` texels.
    fn write_region(
        &mut self,
        texture: &mut Self::Texture,
        desc: &AtlasDescriptor,
        origin: UVec2,
        size: UVec2,
        bytes: &[u8],
    );
}

/// Atlas texels held in host memory.
#[derive(Debug, Clone)]
pub struct CpuAtlas {
    desc: AtlasDescriptor,
    data: Vec<u8>,
}

impl CpuAtlas {
    pub fn new(desc: AtlasDescriptor) -> Self {
        Self {
            desc,
            data: vec![0; desc.byte_size() as usize],
        }
    }

    pub fn descriptor(&self) -> &AtlasDescriptor {
        &self.desc
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Channel bytes of the texel at linear index `texel`.
    pub fn texel(&self, texel: u32) -> &[u8] {
        let channels = self.desc.format.channel_count() as usize;
        let start = texel as usize * channels;
        &self.data[start..start + channels]
    }

    /// Bytes of a whole slot, in the order they were written.
    pub fn slot_bytes(&self, slot: u32) -> Vec<u8> {
        let channels = self.desc.format.channel_count() as usize;
        let (origin, size) = self.desc.slot_region(slot);
        let row_bytes = size.x as usize * channels;
        let mut out = Vec::with_capacity(row_bytes * size.y as usize);
        for row in 0..size.y {
            let start = ((origin.y + row) as usize * self.desc.width as usize
                + origin.x as usize)
                * channels;
            out.extend_from_slice(&self.data[start..start + row_bytes]);
        }
        out
    }
}

/// Backend that keeps atlases in host memory.
#[derive(Debug, Default)]
pub struct CpuAtlasBackend;

impl AtlasBackend for CpuAtlasBackend {
    type Texture = CpuAtlas;

    fn create_atlas(&mut self, desc: &AtlasDescriptor) -> CpuAtlas {
        CpuAtlas::new(*desc)
    }

    fn write_region(
        &mut self,
        texture: &mut CpuAtlas,
        desc: &AtlasDescriptor,
        origin: UVec2,
        size: UVec2,
        bytes: &[u8],
    ) {
        let channels = desc.format.channel_count() as usize;
        let row_bytes = size.x as usize * channels;
        for (row, src) in bytes.chunks_exact(row_bytes).take(size.y as usize).enumerate() {
            let start =
                ((origin.y as usize + row) * desc.width as usize + origin.x as usize) * channels;
            texture.data[start..start + row_bytes].copy_from_slice(src);
        }
    }
}
