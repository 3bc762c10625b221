use crate::types::ZoomedAddress;
use glam::{I64Vec3, IVec3, UVec2, UVec3};
use serde::{Deserialize, Serialize};

/// Anchor-relative address space covered by the lookup table.
///
/// An address maps to an index only if it lies inside `extent` buckets from
/// the anchor (after coarsening the anchor to the address's level) and its
/// level is within `level_count` levels of the anchor's.
///
/// Index layout: x fastest, then y, then z, then level offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSpace {
    pub extent: UVec3,
    pub level_count: u32,
}

impl AddressSpace {
    pub fn new(extent: UVec3, level_count: u32) -> Self {
        Self {
            extent,
            level_count,
        }
    }

    /// Number of addressable buckets (lookup table entries).
    /// Saturates at `u32::MAX`; use [`AddressSpace::checked_capacity`] to detect overflow.
    pub fn capacity(&self) -> u32 {
        self.checked_capacity().unwrap_or(u32::MAX)
    }

    pub fn checked_capacity(&self) -> Option<u32> {
        self.extent
            .x
            .checked_mul(self.extent.y)?
            .checked_mul(self.extent.z)?
            .checked_mul(self.level_count)
    }

    /// Lookup index of `address` relative to `anchor`, or None if out of range.
    pub fn index_of(&self, anchor: ZoomedAddress, address: ZoomedAddress) -> Option<u32> {
        let level_offset = address.level.checked_sub(anchor.level)?;
        if level_offset >= self.level_count {
            return None;
        }
        // i64 so far-apart i32 positions can't overflow.
        let offset = address.position.as_i64vec3() - anchor.coarsened(level_offset).as_i64vec3();
        if offset.min_element() < 0 || offset.cmpge(self.extent.as_i64vec3()).any() {
            return None;
        }
        let offset = offset.as_uvec3();
        let e = self.extent;
        let level_plane = offset.z as u64 + e.z as u64 * level_offset as u64;
        let index = offset.x as u64 + e.x as u64 * (offset.y as u64 + e.y as u64 * level_plane);
        u32::try_from(index).ok()
    }

    /// Inverse of [`AddressSpace::index_of`].
    pub fn address_at(&self, anchor: ZoomedAddress, index: u32) -> Option<ZoomedAddress> {
        if index >= self.checked_capacity()? {
            return None;
        }
        let e = self.extent;
        let x = index % e.x;
        let y = (index / e.x) % e.y;
        let z = (index / (e.x * e.y)) % e.z;
        let level_offset = index / (e.x * e.y * e.z);
        let position =
            anchor.coarsened(level_offset).as_i64vec3() + I64Vec3::new(x as i64, y as i64, z as i64);
        Some(ZoomedAddress {
            position: IVec3::new(
                i32::try_from(position.x).ok()?,
                i32::try_from(position.y).ok()?,
                i32::try_from(position.z).ok()?,
            ),
            level: anchor.level.checked_add(level_offset)?,
        })
    }
}

/// Texel coordinate where `slot` starts inside an atlas of width `atlas_width`.
/// Slots are laid out back to back in row-major texel order.
pub fn slot_origin(slot: u32, packed_bucket_size: u32, atlas_width: u32) -> UVec2 {
    let texel = slot as u64 * packed_bucket_size as u64;
    UVec2::new(
        (texel % atlas_width as u64) as u32,
        (texel / atlas_width as u64) as u32,
    )
}

/// Slot containing texel `origin`. Inverse of [`slot_origin`] for slot origins.
pub fn slot_at(origin: UVec2, packed_bucket_size: u32, atlas_width: u32) -> u32 {
    let texel = origin.y as u64 * atlas_width as u64 + origin.x as u64;
    (texel / packed_bucket_size as u64) as u32
}

/// Rectangle (origin, size) in texels occupied by `slot`.
///
/// Requires that either `packed_bucket_size` is a multiple of `atlas_width`
/// (a slot spans whole rows) or `atlas_width` is a multiple of
/// `packed_bucket_size` (several slots share a row).
pub fn slot_region(slot: u32, packed_bucket_size: u32, atlas_width: u32) -> (UVec2, UVec2) {
    let origin = slot_origin(slot, packed_bucket_size, atlas_width);
    let size = if packed_bucket_size >= atlas_width {
        UVec2::new(atlas_width, packed_bucket_size / atlas_width)
    } else {
        UVec2::new(packed_bucket_size, 1)
    };
    (origin, size)
}

/// Whether a slot of `packed_bucket_size` texels forms a rectangle in an atlas row layout.
pub fn is_rectangular_layout(packed_bucket_size: u32, atlas_width: u32) -> bool {
    if packed_bucket_size == 0 || atlas_width == 0 {
        return false;
    }
    if packed_bucket_size >= atlas_width {
        packed_bucket_size % atlas_width == 0
    } else {
        atlas_width % packed_bucket_size == 0
    }
}
