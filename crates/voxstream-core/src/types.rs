use crate::error::CacheError;
use glam::IVec3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bucket address: bucket-space position plus resolution level.
/// Level 0 is the finest resolution; each level halves it per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ZoomedAddress {
    pub position: IVec3,
    pub level: u32,
}

impl ZoomedAddress {
    pub const fn new(x: i32, y: i32, z: i32, level: u32) -> Self {
        Self {
            position: IVec3::new(x, y, z),
            level,
        }
    }

    /// Position of the bucket covering the same region `levels` levels coarser.
    pub fn coarsened(&self, levels: u32) -> IVec3 {
        let shift = levels.min(31) as i32;
        IVec3::new(
            self.position.x >> shift,
            self.position.y >> shift,
            self.position.z >> shift,
        )
    }
}

/// `[x, y, z, level]`. Fails on a negative level.
impl TryFrom<[i32; 4]> for ZoomedAddress {
    type Error = CacheError;

    fn try_from(v: [i32; 4]) -> Result<Self, CacheError> {
        let level = u32::try_from(v[3]).map_err(|_| CacheError::NegativeLevel(v[3]))?;
        Ok(Self::new(v[0], v[1], v[2], level))
    }
}

impl fmt::Display for ZoomedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.position.x, self.position.y, self.position.z, self.level
        )
    }
}
