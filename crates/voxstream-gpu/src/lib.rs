pub mod atlas;
pub mod lookup_buffer;

pub use atlas::{GpuAtlas, WgpuAtlasBackend};
pub use lookup_buffer::GpuLookupBuffer;
