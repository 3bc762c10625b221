use glam::IVec3;
use voxstream_core::ZoomedAddress;

/// One simulated navigation pattern.
pub struct SceneConfig {
    pub name: &'static str,
    pub frames: u32,
    /// Anchor at frame 0.
    pub start: ZoomedAddress,
    /// Anchor displacement applied every `pan_interval` frames.
    pub pan: IVec3,
    pub pan_interval: u32,
    /// Active box size in buckets, starting at the anchor.
    pub view_extent: IVec3,
    /// Fetch latency range in frames (inclusive).
    pub min_delay: u32,
    pub max_delay: u32,
    /// Overrides the configured atlas height to force capacity pressure.
    pub texture_height: Option<u32>,
}

impl SceneConfig {
    /// Anchor for `frame`.
    pub fn anchor_at(&self, frame: u32) -> ZoomedAddress {
        let steps = if self.pan_interval == 0 {
            0
        } else {
            (frame / self.pan_interval) as i32
        };
        ZoomedAddress {
            position: self.start.position + self.pan * steps,
            level: self.start.level,
        }
    }

    /// Active set for `anchor`, nearest-to-anchor first.
    pub fn active_set(&self, anchor: ZoomedAddress) -> Vec<ZoomedAddress> {
        let mut buckets = Vec::with_capacity(
            (self.view_extent.x * self.view_extent.y * self.view_extent.z).max(0) as usize,
        );
        for z in 0..self.view_extent.z {
            for y in 0..self.view_extent.y {
                for x in 0..self.view_extent.x {
                    buckets.push(ZoomedAddress {
                        position: anchor.position + IVec3::new(x, y, z),
                        level: anchor.level,
                    });
                }
            }
        }
        buckets.sort_by_key(|b| (b.position - anchor.position).length_squared());
        buckets
    }
}

/// Standard suite: static view, slow and fast pans, and an overcommitted atlas.
pub fn standard_scenes(frames: u32) -> Vec<SceneConfig> {
    vec![
        SceneConfig {
            name: "static",
            frames,
            start: ZoomedAddress::new(0, 0, 0, 0),
            pan: IVec3::ZERO,
            pan_interval: 0,
            view_extent: IVec3::new(8, 8, 4),
            min_delay: 1,
            max_delay: 6,
            texture_height: None,
        },
        SceneConfig {
            name: "slow-pan",
            frames,
            start: ZoomedAddress::new(0, 0, 0, 0),
            pan: IVec3::X,
            pan_interval: 8,
            view_extent: IVec3::new(8, 8, 4),
            min_delay: 1,
            max_delay: 6,
            texture_height: None,
        },
        SceneConfig {
            name: "fast-pan",
            frames,
            start: ZoomedAddress::new(0, 0, 0, 0),
            pan: IVec3::new(2, 1, 0),
            pan_interval: 1,
            view_extent: IVec3::new(8, 8, 4),
            min_delay: 2,
            max_delay: 12,
            texture_height: None,
        },
        SceneConfig {
            name: "overcommit",
            frames,
            start: ZoomedAddress::new(0, 0, 0, 0),
            pan: IVec3::X,
            pan_interval: 4,
            view_extent: IVec3::new(8, 8, 4),
            min_delay: 1,
            max_delay: 6,
            texture_height: Some(256),
        },
    ]
}
