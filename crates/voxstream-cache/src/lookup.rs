use bytemuck::{Pod, Zeroable};
use voxstream_core::constants::{LOOKUP_CHANNEL_COUNT, NOT_RESIDENT};

/// One lookup table entry, laid out as `LOOKUP_CHANNEL_COUNT` i32 channels
/// for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct LookupEntry {
    /// Slot index inside the atlas, or `NOT_RESIDENT`.
    pub slot: i32,
    /// Atlas (data texture layer) index, or `NOT_RESIDENT`.
    pub atlas: i32,
}

const _: () = assert!(std::mem::size_of::<LookupEntry>() == LOOKUP_CHANNEL_COUNT * 4);

impl LookupEntry {
    pub const EMPTY: Self = Self {
        slot: NOT_RESIDENT,
        atlas: NOT_RESIDENT,
    };

    pub fn is_resident(&self) -> bool {
        self.slot != NOT_RESIDENT
    }
}

impl Default for LookupEntry {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Flat table mapping anchor-relative bucket index to atlas slot.
/// Sized once from the address space capacity.
#[derive(Debug, Clone)]
pub struct LookupTable {
    entries: Vec<LookupEntry>,
}

impl LookupTable {
    pub fn new(capacity: u32) -> Self {
        Self {
            entries: vec![LookupEntry::EMPTY; capacity as usize],
        }
    }

    /// Replace the whole table contents. Entries not listed become `EMPTY`.
    pub fn rebuild(&mut self, resident: impl IntoIterator<Item = (u32, LookupEntry)>) {
        self.entries.fill(LookupEntry::EMPTY);
        for (index, entry) in resident {
            if let Some(dst) = self.entries.get_mut(index as usize) {
                *dst = entry;
            }
        }
    }

    pub fn get(&self, index: u32) -> Option<LookupEntry> {
        self.entries.get(index as usize).copied()
    }

    pub fn entries(&self) -> &[LookupEntry] {
        &self.entries
    }

    /// Raw channel values, `LOOKUP_CHANNEL_COUNT` per entry.
    pub fn channels(&self) -> &[i32] {
        bytemuck::cast_slice(&self.entries[..])
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.entries[..])
    }

    pub fn capacity(&self) -> u32 {
        self.entries.len() as u32
    }

    pub fn resident_count(&self) -> u32 {
        self.entries.iter().filter(|e| e.is_resident()).count() as u32
    }
}
