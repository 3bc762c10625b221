use voxstream_core::{ElementClass, ZoomedAddress};

/// Bucket lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketState {
    /// Known to the cache; no fetch issued.
    Unloaded,
    /// Fetch issued, payload not yet arrived.
    Requested,
    /// Payload present.
    Loaded,
    /// Dropped from the active set. Payload discarded; late arrivals ignored.
    Evicted,
}

/// Result of delivering a payload to a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// First payload for a requested bucket.
    Stored,
    /// Payload replaced on an already loaded bucket.
    Refreshed,
    /// Payload ignored (bucket evicted, never requested, or superseded).
    Discarded,
}

/// One cubic block of voxels at a given resolution level.
#[derive(Debug, Clone)]
pub struct DataBucket {
    address: ZoomedAddress,
    element_class: ElementClass,
    generation: u64,
    state: BucketState,
    data: Option<Vec<u8>>,
    /// Payload changed since the last atlas write.
    dirty: bool,
}

impl DataBucket {
    pub fn new(address: ZoomedAddress, element_class: ElementClass, generation: u64) -> Self {
        Self {
            address,
            element_class,
            generation,
            state: BucketState::Unloaded,
            data: None,
            dirty: false,
        }
    }

    pub fn address(&self) -> ZoomedAddress {
        self.address
    }

    pub fn element_class(&self) -> ElementClass {
        self.element_class
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> BucketState {
        self.state
    }

    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Issue the fetch. Returns true on the `Unloaded -> Requested` transition.
    pub fn pull(&mut self) -> bool {
        match self.state {
            BucketState::Unloaded => {
                self.state = BucketState::Requested;
                true
            }
            BucketState::Requested | BucketState::Loaded | BucketState::Evicted => false,
        }
    }

    /// Store a payload. Length is validated by the caller against the cache configuration.
    pub fn receive_data(&mut self, payload: Vec<u8>) -> ReceiveOutcome {
        match self.state {
            BucketState::Requested => {
                self.data = Some(payload);
                self.state = BucketState::Loaded;
                self.dirty = true;
                ReceiveOutcome::Stored
            }
            BucketState::Loaded => {
                self.data = Some(payload);
                self.dirty = true;
                ReceiveOutcome::Refreshed
            }
            BucketState::Unloaded | BucketState::Evicted => ReceiveOutcome::Discarded,
        }
    }

    /// True while a payload is waiting to be written to the atlas.
    pub fn has_changed(&self) -> bool {
        self.dirty
    }

    pub fn mark_written(&mut self) {
        self.dirty = false;
    }

    pub fn is_loaded(&self) -> bool {
        self.state == BucketState::Loaded
    }

    pub fn evict(&mut self) {
        self.state = BucketState::Evicted;
        self.data = None;
        self.dirty = false;
    }
}
