use serde::{Deserialize, Serialize};

/// Channel layout of an atlas texel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureFormat {
    Luminance,
    LuminanceAlpha,
    Rgb,
    Rgba,
}

impl TextureFormat {
    /// Bytes (one per channel) in a single texel.
    pub const fn channel_count(self) -> u32 {
        match self {
            TextureFormat::Luminance => 1,
            TextureFormat::LuminanceAlpha => 2,
            TextureFormat::Rgb => 3,
            TextureFormat::Rgba => 4,
        }
    }
}

/// Voxel element type of a data layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ElementClass {
    #[default]
    Uint8,
    Uint16,
    /// Packed RGB color, one byte per channel.
    Uint24,
    Uint32,
    Float32,
}

impl ElementClass {
    pub const fn bytes_per_voxel(self) -> u32 {
        match self {
            ElementClass::Uint8 => 1,
            ElementClass::Uint16 => 2,
            ElementClass::Uint24 => 3,
            ElementClass::Uint32 | ElementClass::Float32 => 4,
        }
    }

    /// Texel layout used to store voxels of this class in an atlas.
    pub const fn texture_format(self) -> TextureFormat {
        match self {
            ElementClass::Uint24 => TextureFormat::Rgb,
            ElementClass::Uint8
            | ElementClass::Uint16
            | ElementClass::Uint32
            | ElementClass::Float32 => TextureFormat::Rgba,
        }
    }

    /// Voxels packed into one texel.
    pub const fn packing_degree(self) -> u32 {
        self.texture_format().channel_count() / self.bytes_per_voxel()
    }
}
