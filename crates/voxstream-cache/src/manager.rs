use crate::atlas::{AtlasBackend, AtlasDescriptor};
use crate::bucket::ReceiveOutcome;
use crate::config::CacheConfig;
use crate::cube::{DataCube, PullTicket};
use crate::lookup::{LookupEntry, LookupTable};
use crate::writer_queue::{WriteJob, WriterQueue};
use std::collections::{BTreeSet, HashMap, HashSet};
use voxstream_core::{AddressSpace, CacheError, ZoomedAddress};

/// Bucket instance currently holding a global slot.
#[derive(Debug, Clone, Copy)]
struct SlotOwner {
    address: ZoomedAddress,
    generation: u64,
    /// The bucket's payload has been written into the slot at least once.
    committed: bool,
}

/// Outcome of one [`TextureBucketManager::set_active_buckets`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub entered: u32,
    pub left: u32,
    /// Buckets given a slot during this call.
    pub assigned: u32,
    /// Active buckets left without a slot because none was free.
    pub over_capacity: u32,
    /// Active buckets outside the anchor-relative address space. Any slot
    /// they held is released.
    pub out_of_range: u32,
    /// Prefetched buckets dropped from the cube without becoming active.
    pub expired: u32,
}

/// Outcome of one [`TextureBucketManager::process_writer_queue`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterQueueStats {
    pub written: u32,
    /// Jobs whose bucket has no data yet; re-queued.
    pub deferred: u32,
    /// Jobs pending after the call.
    pub remaining: u32,
}

/// Snapshot of residency counters, for debug display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResidencyStats {
    pub active: u32,
    pub assigned: u32,
    pub committed: u32,
    pub free_slots: u32,
    pub pending_writes: u32,
    pub cached_buckets: u32,
}

/// Keeps the active buckets resident in a fixed set of texture atlases and
/// publishes the lookup table the renderer samples.
///
/// All mutation happens in `set_active_buckets`, `receive_data` and
/// `process_writer_queue`; the renderer reads through `lookup_table` and
/// `data_textures`.
pub struct TextureBucketManager<B: AtlasBackend> {
    config: CacheConfig,
    address_space: AddressSpace,
    backend: B,
    atlas_descs: Vec<AtlasDescriptor>,
    data_textures: Vec<B::Texture>,
    slots_per_atlas: u32,
    cube: DataCube,
    lookup: LookupTable,
    writer_queue: WriterQueue,
    anchor: ZoomedAddress,
    /// Active set in caller order.
    active: Vec<ZoomedAddress>,
    active_set: HashSet<ZoomedAddress>,
    /// Active bucket -> global slot.
    assigned: HashMap<ZoomedAddress, u32>,
    /// Global slot -> owner. Indexed by global slot.
    slot_owners: Vec<Option<SlotOwner>>,
    /// Lowest index first.
    free_slots: BTreeSet<u32>,
    /// Non-active buckets pulled since the last reconciliation.
    prefetched: HashSet<ZoomedAddress>,
}

impl<B: AtlasBackend> TextureBucketManager<B> {
    /// Create a manager. Atlases are allocated later by `setup_data_textures`.
    pub fn new(config: CacheConfig, backend: B) -> Result<Self, CacheError> {
        config.validate()?;
        let address_space = config.address_space();
        let cube = DataCube::new(config.element_class, config.payload_byte_size());
        Ok(Self {
            slots_per_atlas: config.slots_per_atlas(),
            lookup: LookupTable::new(address_space.capacity()),
            address_space,
            config,
            backend,
            atlas_descs: Vec::new(),
            data_textures: Vec::new(),
            cube,
            writer_queue: WriterQueue::new(),
            anchor: ZoomedAddress::default(),
            active: Vec::new(),
            active_set: HashSet::new(),
            assigned: HashMap::new(),
            slot_owners: Vec::new(),
            free_slots: BTreeSet::new(),
            prefetched: HashSet::new(),
        })
    }

    /// Allocate `layer_count` atlases. Capacity is fixed afterwards.
    pub fn setup_data_textures(&mut self, layer_count: u32) -> Result<(), CacheError> {
        if !self.data_textures.is_empty() {
            return Err(CacheError::AlreadySetUp);
        }
        if layer_count == 0 {
            return Err(CacheError::InvalidConfig(
                "at least one data texture is required".into(),
            ));
        }

        for layer in 0..layer_count {
            let desc = AtlasDescriptor {
                layer,
                width: self.config.texture_width,
                height: self.config.texture_height,
                format: self.config.texture_format(),
                packed_bucket_size: self.get_packed_bucket_size(),
            };
            let texture = self.backend.create_atlas(&desc);
            self.atlas_descs.push(desc);
            self.data_textures.push(texture);
        }

        let total = self.slots_per_atlas as u64 * layer_count as u64;
        let total = total.min(u32::MAX as u64) as u32;
        self.slot_owners = vec![None; total as usize];
        self.free_slots = (0..total).collect();

        log::info!(
            "TextureBucketManager: {} data texture(s) of {}x{} {:?}, {} slots each, {} total; lookup capacity {}",
            layer_count,
            self.config.texture_width,
            self.config.texture_height,
            self.config.texture_format(),
            self.slots_per_atlas,
            total,
            self.lookup.capacity()
        );
        if total < self.address_space.capacity() {
            log::warn!(
                "TextureBucketManager: {} slots cannot hold the full address space of {} buckets",
                total,
                self.address_space.capacity()
            );
        }
        Ok(())
    }

    /// Declare the full active set for the current viewport, relative to `anchor`.
    ///
    /// Buckets leaving the set lose their slot and are evicted. Active buckets
    /// outside the address space around `anchor` lose their slot but stay
    /// cached. Active buckets without a slot take the lowest free slots in the
    /// order given. When slots run out the remaining buckets stay active but
    /// unassigned. Prefetched buckets are kept for one reconciliation.
    pub fn set_active_buckets(
        &mut self,
        buckets: &[ZoomedAddress],
        anchor: ZoomedAddress,
    ) -> Result<Reconciliation, CacheError> {
        if self.data_textures.is_empty() {
            return Err(CacheError::NotSetUp);
        }
        let mut summary = Reconciliation::default();

        let mut next_set = HashSet::with_capacity(buckets.len());
        let next_active: Vec<ZoomedAddress> = buckets
            .iter()
            .copied()
            .filter(|address| next_set.insert(*address))
            .collect();

        let leaving: Vec<ZoomedAddress> = self
            .active
            .iter()
            .filter(|address| !next_set.contains(*address))
            .copied()
            .collect();
        for address in &leaving {
            self.release_slot(address);
            self.cube.evict(address);
            summary.left += 1;
        }

        let prefetched = &self.prefetched;
        let expired: Vec<ZoomedAddress> = self
            .cube
            .addresses()
            .filter(|address| !next_set.contains(address) && !prefetched.contains(address))
            .collect();
        for address in &expired {
            self.cube.evict(address);
            summary.expired += 1;
        }
        self.prefetched.clear();

        for address in &next_active {
            if !self.active_set.contains(address) {
                self.cube.get_or_create(*address);
                summary.entered += 1;
            }
        }

        self.anchor = anchor;
        self.active = next_active;
        self.active_set = next_set;

        let space = self.address_space;
        let unreachable: Vec<ZoomedAddress> = self
            .assigned
            .keys()
            .filter(|address| space.index_of(anchor, **address).is_none())
            .copied()
            .collect();
        for address in &unreachable {
            self.release_slot(address);
        }

        for i in 0..self.active.len() {
            let address = self.active[i];
            if self.assigned.contains_key(&address) {
                continue;
            }
            if self.address_space.index_of(anchor, address).is_none() {
                summary.out_of_range += 1;
                continue;
            }
            match self.free_slots.pop_first() {
                Some(slot) => {
                    self.assign_slot(address, slot);
                    summary.assigned += 1;
                }
                None => summary.over_capacity += 1,
            }
        }

        if summary.over_capacity > 0 {
            log::warn!(
                "TextureBucketManager: {} active buckets exceed the {} available slots and stay unassigned",
                summary.over_capacity,
                self.capacity()
            );
        }
        log::debug!(
            "Active buckets reconciled at anchor {}: {:?}",
            anchor,
            summary
        );

        self.refresh_lookup_table();
        Ok(summary)
    }

    /// Pull every active bucket that has not been requested yet, in active order.
    /// The caller fetches the returned tickets and delivers via `receive_data`.
    pub fn request_missing(&mut self) -> Vec<PullTicket> {
        let cube = &mut self.cube;
        self.active
            .iter()
            .filter_map(|address| cube.pull(*address))
            .collect()
    }

    /// Pull a single bucket, active or not. A non-active bucket is a prefetch:
    /// it stays cached through the next `set_active_buckets` and is dropped
    /// after that unless it became active.
    pub fn pull(&mut self, address: ZoomedAddress) -> Option<PullTicket> {
        if !self.active_set.contains(&address) {
            self.prefetched.insert(address);
        }
        self.cube.pull(address)
    }

    /// Deliver a fetched payload. Only a wrong payload length is an error;
    /// late or duplicate deliveries are handled by policy.
    pub fn receive_data(
        &mut self,
        ticket: PullTicket,
        payload: Vec<u8>,
    ) -> Result<ReceiveOutcome, CacheError> {
        let outcome = self.cube.receive_data(ticket, payload)?;
        if outcome != ReceiveOutcome::Discarded {
            if let Some(&slot) = self.assigned.get(&ticket.address) {
                if !self.writer_queue.contains_slot(slot) {
                    self.writer_queue.push(WriteJob {
                        address: ticket.address,
                        generation: ticket.generation,
                        slot,
                    });
                }
            }
        }
        Ok(outcome)
    }

    /// Drain up to `writes_per_frame` write jobs.
    pub fn process_writer_queue(&mut self) -> WriterQueueStats {
        self.process_writer_queue_with_budget(self.config.writes_per_frame)
    }

    /// Drain up to `max_jobs` write jobs, never more than were pending on entry.
    /// Jobs whose data hasn't arrived go to the back of the queue.
    pub fn process_writer_queue_with_budget(&mut self, max_jobs: usize) -> WriterQueueStats {
        let mut stats = WriterQueueStats::default();
        let budget = max_jobs.min(self.writer_queue.len());
        let mut deferred = Vec::new();

        for _ in 0..budget {
            let Some(job) = self.writer_queue.pop() else {
                break;
            };

            // Releasing a slot cancels its job, so every popped job still
            // matches its slot owner and cube entry.
            let owner = self
                .slot_owners
                .get_mut(job.slot as usize)
                .and_then(Option::as_mut)
                .filter(|o| o.address == job.address && o.generation == job.generation);
            let bucket = self
                .cube
                .get_mut(&job.address)
                .filter(|b| b.generation() == job.generation);
            debug_assert!(
                owner.is_some() && bucket.is_some(),
                "write job for {} outlived slot {}",
                job.address,
                job.slot
            );
            let (Some(owner), Some(bucket)) = (owner, bucket) else {
                continue;
            };

            if !bucket.is_loaded() {
                deferred.push(job);
                stats.deferred += 1;
                continue;
            }
            if owner.committed && !bucket.has_changed() {
                continue;
            }

            let atlas_index = (job.slot / self.slots_per_atlas) as usize;
            let local_slot = job.slot % self.slots_per_atlas;
            let desc = &self.atlas_descs[atlas_index];
            let (origin, size) = desc.slot_region(local_slot);
            if let Some(payload) = bucket.data() {
                self.backend.write_region(
                    &mut self.data_textures[atlas_index],
                    desc,
                    origin,
                    size,
                    payload,
                );
            }
            bucket.mark_written();
            owner.committed = true;
            stats.written += 1;
            log::trace!(
                "Wrote bucket {} to atlas {} slot {}",
                job.address,
                atlas_index,
                local_slot
            );
        }

        for job in deferred {
            self.writer_queue.push(job);
        }
        stats.remaining = self.writer_queue.len() as u32;

        if stats.written > 0 {
            self.refresh_lookup_table();
        }
        stats
    }

    /// Rebuild the lookup table from the current assignment and anchor.
    /// Only slots whose payload has been written are published.
    pub fn refresh_lookup_table(&mut self) {
        let space = self.address_space;
        let anchor = self.anchor;
        let slots_per_atlas = self.slots_per_atlas;
        let slot_owners = &self.slot_owners;
        let resident = self.assigned.iter().filter_map(|(address, &slot)| {
            let owner = slot_owners.get(slot as usize)?.as_ref()?;
            if !owner.committed {
                return None;
            }
            let index = space.index_of(anchor, *address)?;
            Some((
                index,
                LookupEntry {
                    slot: (slot % slots_per_atlas) as i32,
                    atlas: (slot / slots_per_atlas) as i32,
                },
            ))
        });
        self.lookup.rebuild(resident);
    }

    /// Texels per bucket slot; multiply a lookup entry's slot by this to get
    /// the slot's first texel.
    pub fn get_packed_bucket_size(&self) -> u32 {
        self.config.packed_bucket_size()
    }

    /// Lookup table index of `address` under the current anchor.
    pub fn bucket_index(&self, address: ZoomedAddress) -> Option<u32> {
        self.address_space.index_of(self.anchor, address)
    }

    /// Global slot held by `address`, if assigned.
    pub fn slot_of(&self, address: ZoomedAddress) -> Option<u32> {
        self.assigned.get(&address).copied()
    }

    pub fn lookup_table(&self) -> &LookupTable {
        &self.lookup
    }

    pub fn data_textures(&self) -> &[B::Texture] {
        &self.data_textures
    }

    pub fn atlas_descriptors(&self) -> &[AtlasDescriptor] {
        &self.atlas_descs
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn anchor(&self) -> ZoomedAddress {
        self.anchor
    }

    pub fn active_buckets(&self) -> &[ZoomedAddress] {
        &self.active
    }

    pub fn cube(&self) -> &DataCube {
        &self.cube
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn pending_writes(&self) -> usize {
        self.writer_queue.len()
    }

    /// Total slots across all atlases (0 before setup).
    pub fn capacity(&self) -> u32 {
        self.slot_owners.len() as u32
    }

    pub fn free_slot_count(&self) -> u32 {
        self.free_slots.len() as u32
    }

    pub fn stats(&self) -> ResidencyStats {
        ResidencyStats {
            active: self.active.len() as u32,
            assigned: self.assigned.len() as u32,
            committed: self
                .slot_owners
                .iter()
                .flatten()
                .filter(|o| o.committed)
                .count() as u32,
            free_slots: self.free_slot_count(),
            pending_writes: self.writer_queue.len() as u32,
            cached_buckets: self.cube.len() as u32,
        }
    }

    fn assign_slot(&mut self, address: ZoomedAddress, slot: u32) {
        let generation = self.cube.get_or_create(address).generation();
        self.slot_owners[slot as usize] = Some(SlotOwner {
            address,
            generation,
            committed: false,
        });
        self.assigned.insert(address, slot);
        self.writer_queue.push(WriteJob {
            address,
            generation,
            slot,
        });
    }

    fn release_slot(&mut self, address: &ZoomedAddress) {
        if let Some(slot) = self.assigned.remove(address) {
            self.slot_owners[slot as usize] = None;
            self.free_slots.insert(slot);
            self.writer_queue.cancel_slot(slot);
        }
    }
}
