use glam::UVec3;
use serde::{Deserialize, Serialize};
use voxstream_core::constants::*;
use voxstream_core::math::{is_rectangular_layout, AddressSpace};
use voxstream_core::{CacheError, ElementClass, TextureFormat};

/// Setup-time configuration of a [`crate::TextureBucketManager`].
/// Fixed for the lifetime of one manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub element_class: ElementClass,
    /// Bucket side length in voxels.
    pub bucket_width: u32,
    pub texture_width: u32,
    pub texture_height: u32,
    /// Per-axis extent of the anchor-relative address space, in buckets.
    pub address_extent: [u32; 3],
    /// Resolution levels addressable above the anchor's level (including it).
    pub level_count: u32,
    /// Writer queue jobs drained per `process_writer_queue` call.
    pub writes_per_frame: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            element_class: ElementClass::Uint8,
            bucket_width: BUCKET_WIDTH,
            texture_width: DEFAULT_TEXTURE_WIDTH,
            texture_height: DEFAULT_TEXTURE_HEIGHT,
            address_extent: [DEFAULT_ADDRESS_EXTENT; 3],
            level_count: 1,
            writes_per_frame: DEFAULT_WRITES_PER_FRAME,
        }
    }
}

impl CacheConfig {
    pub fn voxels_per_bucket(&self) -> u32 {
        self.bucket_width * self.bucket_width * self.bucket_width
    }

    /// Exact byte length a bucket payload must have.
    pub fn payload_byte_size(&self) -> usize {
        self.voxels_per_bucket() as usize * self.element_class.bytes_per_voxel() as usize
    }

    pub fn texture_format(&self) -> TextureFormat {
        self.element_class.texture_format()
    }

    /// Texels occupied by one bucket slot.
    pub fn packed_bucket_size(&self) -> u32 {
        self.voxels_per_bucket() / self.element_class.packing_degree()
    }

    /// Slots available in one atlas.
    pub fn slots_per_atlas(&self) -> u32 {
        let texels = self.texture_width as u64 * self.texture_height as u64;
        (texels / self.packed_bucket_size().max(1) as u64).min(u32::MAX as u64) as u32
    }

    pub fn address_space(&self) -> AddressSpace {
        AddressSpace::new(UVec3::from_array(self.address_extent), self.level_count)
    }

    pub fn validate(&self) -> Result<(), CacheError> {
        if self.bucket_width == 0 {
            return Err(CacheError::InvalidConfig("bucket_width must be > 0".into()));
        }
        let voxels = self
            .bucket_width
            .checked_mul(self.bucket_width)
            .and_then(|v| v.checked_mul(self.bucket_width));
        if voxels.is_none() {
            return Err(CacheError::InvalidConfig(format!(
                "bucket_width {} overflows the voxel count",
                self.bucket_width
            )));
        }
        if self.texture_width == 0 || self.texture_height == 0 {
            return Err(CacheError::InvalidConfig(format!(
                "texture size {}x{} must be non-zero",
                self.texture_width, self.texture_height
            )));
        }
        if self.address_extent.contains(&0) || self.level_count == 0 {
            return Err(CacheError::InvalidConfig(
                "address_extent and level_count must be non-zero".into(),
            ));
        }
        if self.address_space().checked_capacity().is_none() {
            return Err(CacheError::InvalidConfig(format!(
                "address space {:?} x {} levels overflows the lookup table",
                self.address_extent, self.level_count
            )));
        }
        if self.writes_per_frame == 0 {
            return Err(CacheError::InvalidConfig(
                "writes_per_frame must be > 0".into(),
            ));
        }
        let packing = self.element_class.packing_degree();
        if self.voxels_per_bucket() % packing != 0 {
            return Err(CacheError::InvalidConfig(format!(
                "{} voxels per bucket cannot be packed {} per texel",
                self.voxels_per_bucket(),
                packing
            )));
        }
        let packed = self.packed_bucket_size();
        if !is_rectangular_layout(packed, self.texture_width) {
            return Err(CacheError::InvalidConfig(format!(
                "slot of {} texels does not tile an atlas {} texels wide",
                packed, self.texture_width
            )));
        }
        if self.slots_per_atlas() == 0 {
            return Err(CacheError::InvalidConfig(format!(
                "atlas {}x{} is too small for one slot of {} texels",
                self.texture_width, self.texture_height, packed
            )));
        }
        Ok(())
    }
}

/// Parse a [`CacheConfig`] from RON. Missing fields take their defaults.
pub fn load_config_from_str(ron_str: &str) -> Result<CacheConfig, CacheError> {
    let options = ron::Options::default();
    let config: CacheConfig = options
        .from_str(ron_str)
        .map_err(|e| CacheError::ConfigParse(e.to_string()))?;
    config.validate()?;
    Ok(config)
}
