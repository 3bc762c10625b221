use std::time::Instant;

use voxstream_cache::{
    AtlasBackend, CacheConfig, PullTicket, ReceiveOutcome, TextureBucketManager,
};
use voxstream_core::{CacheError, ZoomedAddress};

use crate::scenes::SceneConfig;

/// Timing of `process_writer_queue` calls, in milliseconds.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TimingSeries {
    pub mean_ms: f64,
    pub median_ms: f64,
    pub p95_ms: f64,
    pub max_ms: f64,
}

impl TimingSeries {
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self {
                mean_ms: 0.0,
                median_ms: 0.0,
                p95_ms: 0.0,
                max_ms: 0.0,
            };
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let percentile = |p: f64| {
            let idx = ((sorted.len() - 1) as f64 * p).round() as usize;
            sorted[idx]
        };
        Self {
            mean_ms: sorted.iter().sum::<f64>() / sorted.len() as f64,
            median_ms: percentile(0.5),
            p95_ms: percentile(0.95),
            max_ms: sorted[sorted.len() - 1],
        }
    }
}

/// Result of one simulated navigation scene.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SceneResult {
    pub scene_name: String,
    pub frames: u32,
    pub slot_capacity: u32,
    pub total_written: u32,
    pub total_deferred: u32,
    pub late_arrivals_discarded: u32,
    pub max_pending_writes: u32,
    /// Mean fraction of the active set published in the lookup table.
    pub mean_residency: f64,
    /// First frame on which every assignable active bucket was published.
    pub first_fully_resident_frame: Option<u32>,
    pub writer_timings: TimingSeries,
}

/// splitmix64 finalizer; deterministic per (seed, value).
fn mix(seed: u64, value: u64) -> u64 {
    let mut z = seed ^ value.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn address_key(address: ZoomedAddress) -> u64 {
    let p = address.position;
    (p.x as u32 as u64) ^ ((p.y as u32 as u64) << 21) ^ ((p.z as u32 as u64) << 42)
        ^ ((address.level as u64) << 60)
}

/// Synthetic payload for `address`: every byte derived from the address.
pub fn synthesize_payload(address: ZoomedAddress, byte_size: usize) -> Vec<u8> {
    let fill = (mix(0, address_key(address)) & 0xFF) as u8;
    vec![fill; byte_size]
}

/// Run one scene against a fresh manager. `publish` is called after every
/// frame's drain, e.g. to upload the lookup table.
pub fn run_scene<B, F>(
    scene: &SceneConfig,
    base_config: &CacheConfig,
    backend: B,
    seed: u64,
    mut publish: F,
) -> Result<SceneResult, CacheError>
where
    B: AtlasBackend,
    F: FnMut(&TextureBucketManager<B>),
{
    log::info!("Running scene '{}' ({} frames)...", scene.name, scene.frames);

    let mut config = base_config.clone();
    if let Some(height) = scene.texture_height {
        config.texture_height = height;
    }
    let payload_size = config.payload_byte_size();
    let mut manager = TextureBucketManager::new(config, backend)?;
    manager.setup_data_textures(1)?;

    let mut in_flight: Vec<(u32, PullTicket)> = Vec::new();
    let mut samples = Vec::with_capacity(scene.frames as usize);
    let mut total_written = 0u32;
    let mut total_deferred = 0u32;
    let mut discarded = 0u32;
    let mut max_pending = 0u32;
    let mut residency_sum = 0.0f64;
    let mut first_full = None;
    let delay_span = scene.max_delay.saturating_sub(scene.min_delay) as u64 + 1;

    for frame in 0..scene.frames {
        let anchor = scene.anchor_at(frame);
        let active = scene.active_set(anchor);
        let summary = manager.set_active_buckets(&active, anchor)?;

        for ticket in manager.request_missing() {
            let jitter = mix(seed, address_key(ticket.address) ^ ticket.generation) % delay_span;
            let due = frame + scene.min_delay + jitter as u32;
            in_flight.push((due, ticket));
        }

        let mut still_in_flight = Vec::with_capacity(in_flight.len());
        for (due, ticket) in in_flight.drain(..) {
            if due > frame {
                still_in_flight.push((due, ticket));
                continue;
            }
            let payload = synthesize_payload(ticket.address, payload_size);
            if manager.receive_data(ticket, payload)? == ReceiveOutcome::Discarded {
                discarded += 1;
            }
        }
        in_flight = still_in_flight;

        let start = Instant::now();
        let stats = manager.process_writer_queue();
        samples.push(start.elapsed().as_secs_f64() * 1000.0);

        total_written += stats.written;
        total_deferred += stats.deferred;
        max_pending = max_pending.max(stats.remaining);

        let published = manager.lookup_table().resident_count();
        let assignable = active.len() as u32 - summary.out_of_range.min(active.len() as u32);
        let assignable = assignable.min(manager.capacity());
        residency_sum += if assignable == 0 {
            1.0
        } else {
            published as f64 / assignable as f64
        };
        if first_full.is_none() && published >= assignable {
            first_full = Some(frame);
        }

        publish(&manager);
    }

    Ok(SceneResult {
        scene_name: scene.name.to_string(),
        frames: scene.frames,
        slot_capacity: manager.capacity(),
        total_written,
        total_deferred,
        late_arrivals_discarded: discarded,
        max_pending_writes: max_pending,
        mean_residency: residency_sum / scene.frames.max(1) as f64,
        first_fully_resident_frame: first_full,
        writer_timings: TimingSeries::from_samples(&samples),
    })
}
