pub mod constants;
pub mod element;
pub mod error;
pub mod math;
pub mod types;

pub use element::{ElementClass, TextureFormat};
pub use error::CacheError;
pub use math::AddressSpace;
pub use types::ZoomedAddress;
