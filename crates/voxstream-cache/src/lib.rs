pub mod atlas;
pub mod bucket;
pub mod config;
pub mod cube;
pub mod lookup;
pub mod manager;
pub mod writer_queue;

#[cfg(test)]
mod test_harness;

pub use atlas::{AtlasBackend, AtlasDescriptor, CpuAtlas, CpuAtlasBackend};
pub use bucket::{BucketState, DataBucket, ReceiveOutcome};
pub use config::{load_config_from_str, CacheConfig};
pub use cube::{DataCube, PullTicket};
pub use lookup::{LookupEntry, LookupTable};
pub use manager::{Reconciliation, ResidencyStats, TextureBucketManager, WriterQueueStats};
pub use writer_queue::{WriteJob, WriterQueue};
