//! Shared constants for the bucket cache and its GPU backend.
//! The renderer's shaders must agree with the lookup table layout
//! and sentinel values defined here.

/// Default side length of a bucket in voxels.
pub const BUCKET_WIDTH: u32 = 32;

/// Voxels in one default-sized bucket (32^3).
pub const VOXELS_PER_BUCKET: u32 = BUCKET_WIDTH * BUCKET_WIDTH * BUCKET_WIDTH;

/// Number of i32 channels per lookup table entry: slot index, atlas index.
pub const LOOKUP_CHANNEL_COUNT: usize = 2;

/// Lookup sentinel: the address is not backed by a written atlas slot.
pub const NOT_RESIDENT: i32 = -1;

/// Default atlas texture width in texels.
pub const DEFAULT_TEXTURE_WIDTH: u32 = 4096;

/// Default atlas texture height in texels.
pub const DEFAULT_TEXTURE_HEIGHT: u32 = 4096;

/// Default per-axis extent of the anchor-relative address space, in buckets.
pub const DEFAULT_ADDRESS_EXTENT: u32 = 16;

/// Default number of writer queue jobs drained per frame.
pub const DEFAULT_WRITES_PER_FRAME: usize = 16;
