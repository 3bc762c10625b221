use crate::bucket::{BucketState, DataBucket, ReceiveOutcome};
use std::collections::HashMap;
use voxstream_core::{CacheError, ElementClass, ZoomedAddress};

/// Handle returned by a pull. Delivering data requires the ticket so that a
/// payload fetched for an evicted bucket can't land in its replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PullTicket {
    pub address: ZoomedAddress,
    pub generation: u64,
}

/// Store of all live bucket instances, keyed by address.
pub struct DataCube {
    buckets: HashMap<ZoomedAddress, DataBucket>,
    element_class: ElementClass,
    payload_byte_size: usize,
    next_generation: u64,
}

impl DataCube {
    pub fn new(element_class: ElementClass, payload_byte_size: usize) -> Self {
        Self {
            buckets: HashMap::new(),
            element_class,
            payload_byte_size,
            next_generation: 0,
        }
    }

    /// Get the bucket at `address`, creating an `Unloaded` one if absent.
    pub fn get_or_create(&mut self, address: ZoomedAddress) -> &mut DataBucket {
        let element_class = self.element_class;
        let next_generation = &mut self.next_generation;
        self.buckets.entry(address).or_insert_with(|| {
            let generation = *next_generation;
            *next_generation += 1;
            DataBucket::new(address, element_class, generation)
        })
    }

    pub fn get(&self, address: &ZoomedAddress) -> Option<&DataBucket> {
        self.buckets.get(address)
    }

    pub fn get_mut(&mut self, address: &ZoomedAddress) -> Option<&mut DataBucket> {
        self.buckets.get_mut(address)
    }

    /// Pull the bucket at `address` (creating it if needed).
    /// Returns a ticket only on the `Unloaded -> Requested` transition.
    pub fn pull(&mut self, address: ZoomedAddress) -> Option<PullTicket> {
        let bucket = self.get_or_create(address);
        if bucket.pull() {
            Some(PullTicket {
                address,
                generation: bucket.generation(),
            })
        } else {
            None
        }
    }

    /// Deliver a fetched payload. The length is checked first: a wrong-sized
    /// payload is a data source contract violation whatever the bucket's state.
    pub fn receive_data(
        &mut self,
        ticket: PullTicket,
        payload: Vec<u8>,
    ) -> Result<ReceiveOutcome, CacheError> {
        if payload.len() != self.payload_byte_size {
            return Err(CacheError::PayloadSizeMismatch {
                expected: self.payload_byte_size,
                actual: payload.len(),
            });
        }
        match self.buckets.get_mut(&ticket.address) {
            Some(bucket) if bucket.generation() == ticket.generation => {
                Ok(bucket.receive_data(payload))
            }
            _ => {
                log::debug!(
                    "Discarding late payload for bucket {} (generation {})",
                    ticket.address,
                    ticket.generation
                );
                Ok(ReceiveOutcome::Discarded)
            }
        }
    }

    /// Evict and remove the bucket at `address`. The payload is dropped.
    pub fn evict(&mut self, address: &ZoomedAddress) -> Option<DataBucket> {
        let mut bucket = self.buckets.remove(address)?;
        bucket.evict();
        Some(bucket)
    }

    pub fn addresses(&self) -> impl Iterator<Item = ZoomedAddress> + '_ {
        self.buckets.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Counts per state: (unloaded, requested, loaded).
    pub fn state_counts(&self) -> (u32, u32, u32) {
        let mut unloaded = 0u32;
        let mut requested = 0u32;
        let mut loaded = 0u32;
        for bucket in self.buckets.values() {
            match bucket.state() {
                BucketState::Unloaded => unloaded += 1,
                BucketState::Requested => requested += 1,
                BucketState::Loaded => loaded += 1,
                BucketState::Evicted => {}
            }
        }
        (unloaded, requested, loaded)
    }

    pub fn payload_byte_size(&self) -> usize {
        self.payload_byte_size
    }
}
