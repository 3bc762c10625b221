use thiserror::Error;

/// Errors surfaced by the bucket cache.
///
/// Timing artifacts (late arrivals, over-capacity, stale writes) are policy
/// and never show up here. Only contract violations and misuse do.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("bucket payload has {actual} bytes, expected {expected}")]
    PayloadSizeMismatch { expected: usize, actual: usize },

    #[error("bucket address level {0} is negative")]
    NegativeLevel(i32),

    #[error("data textures have not been set up")]
    NotSetUp,

    #[error("data textures are already set up; capacity is fixed after setup")]
    AlreadySetUp,

    #[error("invalid cache configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to parse cache configuration RON: {0}")]
    ConfigParse(String),
}
