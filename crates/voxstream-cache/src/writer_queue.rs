use std::collections::{HashMap, VecDeque};
use voxstream_core::ZoomedAddress;

/// Pending upload of a bucket's payload into a global atlas slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteJob {
    pub address: ZoomedAddress,
    /// Generation of the bucket instance the slot was assigned to.
    pub generation: u64,
    pub slot: u32,
}

/// FIFO of write jobs holding at most one live job per destination slot.
///
/// Superseded and cancelled jobs stay in the deque as tombstones and are
/// skipped on pop; the deque is compacted when tombstones dominate.
#[derive(Debug, Default)]
pub struct WriterQueue {
    jobs: VecDeque<(u64, WriteJob)>,
    /// slot -> sequence number of its live job
    live: HashMap<u32, u64>,
    next_seq: u64,
}

impl WriterQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a job. Replaces any pending job for the same slot.
    pub fn push(&mut self, job: WriteJob) {
        let seq = self.next_seq;
        self.next_seq += 1;
        if self.live.insert(job.slot, seq).is_some() {
            log::trace!("Write job for slot {} superseded", job.slot);
        }
        self.jobs.push_back((seq, job));
        if self.jobs.len() > 2 * self.live.len() + 16 {
            self.compact();
        }
    }

    /// Next live job in FIFO order.
    pub fn pop(&mut self) -> Option<WriteJob> {
        while let Some((seq, job)) = self.jobs.pop_front() {
            if self.live.get(&job.slot) == Some(&seq) {
                self.live.remove(&job.slot);
                return Some(job);
            }
        }
        None
    }

    /// Drop the pending job for `slot`, if any.
    pub fn cancel_slot(&mut self, slot: u32) -> bool {
        self.live.remove(&slot).is_some()
    }

    pub fn contains_slot(&self, slot: u32) -> bool {
        self.live.contains_key(&slot)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn clear(&mut self) {
        self.jobs.clear();
        self.live.clear();
    }

    fn compact(&mut self) {
        let live = &self.live;
        self.jobs
            .retain(|(seq, job)| live.get(&job.slot) == Some(seq));
    }
}
