/// Scenario tests driving a `TextureBucketManager` over the CPU atlas backend.
/// Each test constructs a fresh manager.

#[cfg(test)]
mod tests {
    use crate::atlas::CpuAtlasBackend;
    use crate::bucket::ReceiveOutcome;
    use crate::config::CacheConfig;
    use crate::lookup::LookupEntry;
    use crate::manager::TextureBucketManager;
    use std::collections::HashSet;
    use voxstream_core::{CacheError, ZoomedAddress};

    type Manager = TextureBucketManager<CpuAtlasBackend>;

    const PAYLOAD_SIZE: usize = 32 * 32 * 32;

    /// 8192-texel uint8 slots in a 2048-wide atlas: each slot is 4 rows.
    fn config(slots_per_atlas: u32) -> CacheConfig {
        CacheConfig {
            texture_width: 2048,
            texture_height: 4 * slots_per_atlas,
            address_extent: [4, 4, 4],
            ..CacheConfig::default()
        }
    }

    fn manager(slots_per_atlas: u32, layers: u32) -> Manager {
        let mut tbm =
            TextureBucketManager::new(config(slots_per_atlas), CpuAtlasBackend).expect("config");
        tbm.setup_data_textures(layers).expect("setup");
        tbm
    }

    fn addr(v: [i32; 4]) -> ZoomedAddress {
        ZoomedAddress::try_from(v).expect("valid address")
    }

    fn payload(first_byte: u8) -> Vec<u8> {
        let mut data = vec![0u8; PAYLOAD_SIZE];
        data[0] = first_byte;
        data
    }

    /// Pull and deliver a bucket, the way a finished fetch would.
    fn build_bucket(tbm: &mut Manager, address: ZoomedAddress, first_byte: u8) {
        let ticket = tbm.pull(address).expect("bucket not yet requested");
        let outcome = tbm.receive_data(ticket, payload(first_byte)).expect("payload");
        assert_eq!(outcome, ReceiveOutcome::Stored);
    }

    fn set_active_buckets_and_wait(
        tbm: &mut Manager,
        buckets: &[ZoomedAddress],
        anchor: ZoomedAddress,
    ) {
        tbm.set_active_buckets(buckets, anchor).expect("set up");
        // Slowest case: one write per call.
        for _ in buckets {
            tbm.process_writer_queue();
        }
    }

    /// First byte stored at the slot the lookup table publishes for `address`.
    fn published_first_byte(tbm: &Manager, address: ZoomedAddress) -> Option<u8> {
        let index = tbm.bucket_index(address)?;
        let entry = tbm.lookup_table().get(index)?;
        if !entry.is_resident() {
            return None;
        }
        let texel = tbm.get_packed_bucket_size() * entry.slot as u32;
        Some(tbm.data_textures()[entry.atlas as usize].texel(texel)[0])
    }

    #[test]
    fn test_basic_functionality() {
        let mut tbm = manager(4, 1);
        let buckets = [addr([1, 1, 1, 0]), addr([1, 1, 2, 0]), addr([1, 2, 1, 0])];
        for (b, first) in buckets.iter().zip([100u8, 101, 102]) {
            build_bucket(&mut tbm, *b, first);
        }

        set_active_buckets_and_wait(&mut tbm, &buckets, addr([1, 1, 1, 0]));

        assert_eq!(published_first_byte(&tbm, buckets[0]), Some(100));
        assert_eq!(published_first_byte(&tbm, buckets[1]), Some(101));
        assert_eq!(published_first_byte(&tbm, buckets[2]), Some(102));
    }

    #[test]
    fn test_changing_active_buckets() {
        let mut tbm = manager(4, 1);
        let buckets = [
            addr([0, 0, 0, 0]),
            addr([0, 0, 1, 0]),
            addr([0, 1, 0, 0]),
            addr([1, 0, 0, 0]),
            addr([1, 0, 1, 0]),
            addr([1, 1, 0, 0]),
        ];
        for (b, first) in buckets.iter().zip([100u8, 101, 102, 200, 201, 202]) {
            build_bucket(&mut tbm, *b, first);
        }

        set_active_buckets_and_wait(&mut tbm, &buckets[0..3], addr([0, 0, 0, 0]));
        set_active_buckets_and_wait(&mut tbm, &buckets[3..6], addr([1, 0, 0, 0]));

        assert_eq!(published_first_byte(&tbm, buckets[3]), Some(200));
        assert_eq!(published_first_byte(&tbm, buckets[4]), Some(201));
        assert_eq!(published_first_byte(&tbm, buckets[5]), Some(202));
        assert_eq!(tbm.lookup_table().resident_count(), 3);
        for old in &buckets[0..3] {
            assert!(tbm.cube().get(old).is_none(), "{} should be evicted", old);
            assert_eq!(tbm.slot_of(*old), None);
        }
    }

    #[test]
    fn test_lowest_free_slot_first() {
        let mut tbm = manager(4, 1);
        let a = addr([0, 0, 0, 0]);
        let b = addr([1, 0, 0, 0]);
        let c = addr([2, 0, 0, 0]);
        let anchor = addr([0, 0, 0, 0]);
        tbm.set_active_buckets(&[a, b, c], anchor).expect("set up");
        assert_eq!(tbm.slot_of(a), Some(0));
        assert_eq!(tbm.slot_of(b), Some(1));
        assert_eq!(tbm.slot_of(c), Some(2));

        let d = addr([3, 0, 0, 0]);
        tbm.set_active_buckets(&[a, c, d], anchor).expect("set up");
        assert_eq!(tbm.slot_of(d), Some(1), "freed slot 1 is reused before 3");
        assert_eq!(tbm.free_slot_count(), 1);
    }

    #[test]
    fn test_capacity_overflow_leaves_excess_unassigned() {
        let mut tbm = manager(4, 1);
        let anchor = addr([0, 0, 0, 0]);
        let buckets: Vec<ZoomedAddress> = (0..6).map(|i| addr([i % 4, i / 4, 0, 0])).collect();
        for (i, b) in buckets.iter().enumerate() {
            build_bucket(&mut tbm, *b, i as u8 + 1);
        }

        let summary = tbm.set_active_buckets(&buckets, anchor).expect("set up");
        assert_eq!(summary.assigned, 4);
        assert_eq!(summary.over_capacity, 2);
        for _ in 0..4 {
            tbm.process_writer_queue();
        }
        assert_eq!(tbm.lookup_table().resident_count(), 4);
        assert_eq!(tbm.stats().active, 6);
        assert_eq!(published_first_byte(&tbm, buckets[4]), None);

        // Dropping two assigned buckets lets the waiting ones in.
        let remaining: Vec<ZoomedAddress> = buckets[2..].to_vec();
        let summary = tbm.set_active_buckets(&remaining, anchor).expect("set up");
        assert_eq!(summary.left, 2);
        assert_eq!(summary.assigned, 2);
        assert_eq!(summary.over_capacity, 0);
        for _ in 0..4 {
            tbm.process_writer_queue();
        }
        assert_eq!(published_first_byte(&tbm, buckets[4]), Some(5));
        assert_eq!(published_first_byte(&tbm, buckets[5]), Some(6));
    }

    #[test]
    fn test_unloaded_bucket_is_not_published_until_written() {
        let mut tbm = manager(4, 1);
        let a = addr([0, 0, 0, 0]);
        tbm.set_active_buckets(&[a], a).expect("set up");

        let tickets = tbm.request_missing();
        assert_eq!(tickets.len(), 1);
        assert!(tbm.request_missing().is_empty());

        let stats = tbm.process_writer_queue();
        assert_eq!(stats.deferred, 1);
        assert_eq!(stats.remaining, 1);
        assert_eq!(
            tbm.lookup_table().get(0),
            Some(LookupEntry::EMPTY),
            "renderer sees the sentinel while data is in flight"
        );

        tbm.receive_data(tickets[0], payload(42)).expect("payload");
        let stats = tbm.process_writer_queue();
        assert_eq!(stats.written, 1);
        assert_eq!(stats.remaining, 0);
        assert_eq!(published_first_byte(&tbm, a), Some(42));
    }

    #[test]
    fn test_late_arrival_after_eviction_leaves_atlas_untouched() {
        let mut tbm = manager(1, 1);
        let a = addr([0, 0, 0, 0]);
        let b = addr([1, 0, 0, 0]);
        let anchor = addr([0, 0, 0, 0]);

        tbm.set_active_buckets(&[a], anchor).expect("set up");
        let stale_ticket = tbm.request_missing()[0];
        tbm.process_writer_queue();

        // `a` leaves before its data arrives; `b` takes over the only slot.
        tbm.set_active_buckets(&[b], anchor).expect("set up");
        assert_eq!(tbm.slot_of(b), Some(0));
        let ticket = tbm.request_missing()[0];
        tbm.receive_data(ticket, payload(7)).expect("payload");
        tbm.process_writer_queue();
        let before = tbm.data_textures()[0].bytes().to_vec();

        let outcome = tbm.receive_data(stale_ticket, payload(99)).expect("payload");
        assert_eq!(outcome, ReceiveOutcome::Discarded);
        let stats = tbm.process_writer_queue();
        assert_eq!(stats.written, 0);
        assert_eq!(tbm.data_textures()[0].bytes(), &before[..]);
        assert_eq!(published_first_byte(&tbm, b), Some(7));
        assert_eq!(published_first_byte(&tbm, a), None);
    }

    #[test]
    fn test_evicted_bucket_not_readable_until_rewritten() {
        let mut tbm = manager(4, 1);
        let a = addr([0, 0, 0, 0]);
        let b = addr([1, 0, 0, 0]);
        build_bucket(&mut tbm, a, 10);
        build_bucket(&mut tbm, b, 11);
        set_active_buckets_and_wait(&mut tbm, &[a, b], a);
        assert_eq!(published_first_byte(&tbm, a), Some(10));

        tbm.set_active_buckets(&[b], a).expect("set up");
        assert_eq!(published_first_byte(&tbm, a), None);

        // Re-added: a fresh, unloaded instance. Not readable until refetched.
        tbm.set_active_buckets(&[b, a], a).expect("set up");
        tbm.process_writer_queue();
        assert_eq!(published_first_byte(&tbm, a), None);

        let ticket = tbm.request_missing()[0];
        assert_eq!(ticket.address, a);
        tbm.receive_data(ticket, payload(12)).expect("payload");
        tbm.process_writer_queue();
        assert_eq!(published_first_byte(&tbm, a), Some(12));
    }

    #[test]
    fn test_refresh_rewrites_resident_slot() {
        let mut tbm = manager(2, 1);
        let a = addr([0, 0, 0, 0]);
        tbm.set_active_buckets(&[a], a).expect("set up");
        let ticket = tbm.request_missing()[0];
        tbm.receive_data(ticket, payload(1)).expect("payload");
        tbm.process_writer_queue();
        assert_eq!(published_first_byte(&tbm, a), Some(1));

        let outcome = tbm.receive_data(ticket, payload(2)).expect("payload");
        assert_eq!(outcome, ReceiveOutcome::Refreshed);
        assert_eq!(tbm.pending_writes(), 1);
        let stats = tbm.process_writer_queue();
        assert_eq!(stats.written, 1);
        assert_eq!(published_first_byte(&tbm, a), Some(2));
    }

    #[test]
    fn test_wrong_payload_size_is_surfaced() {
        let mut tbm = manager(2, 1);
        let a = addr([0, 0, 0, 0]);
        tbm.set_active_buckets(&[a], a).expect("set up");
        let ticket = tbm.request_missing()[0];
        let result = tbm.receive_data(ticket, vec![0u8; 100]);
        assert_eq!(
            result,
            Err(CacheError::PayloadSizeMismatch {
                expected: PAYLOAD_SIZE,
                actual: 100
            })
        );
        assert_eq!(tbm.pending_writes(), 1, "the slot's job is still waiting");
    }

    #[test]
    fn test_setup_is_required_and_fixed() {
        let mut tbm = TextureBucketManager::new(config(2), CpuAtlasBackend).expect("config");
        let a = addr([0, 0, 0, 0]);
        assert_eq!(tbm.set_active_buckets(&[a], a), Err(CacheError::NotSetUp));
        assert_eq!(tbm.capacity(), 0);
        tbm.setup_data_textures(2).expect("setup");
        assert_eq!(tbm.capacity(), 4);
        assert_eq!(tbm.setup_data_textures(3), Err(CacheError::AlreadySetUp));
        assert_eq!(tbm.capacity(), 4);
    }

    #[test]
    fn test_second_atlas_used_after_first_fills() {
        let mut tbm = manager(2, 2);
        let anchor = addr([0, 0, 0, 0]);
        let buckets = [addr([0, 0, 0, 0]), addr([1, 0, 0, 0]), addr([2, 0, 0, 0])];
        for (b, first) in buckets.iter().zip([1u8, 2, 3]) {
            build_bucket(&mut tbm, *b, first);
        }
        set_active_buckets_and_wait(&mut tbm, &buckets, anchor);

        let index = tbm.bucket_index(buckets[2]).expect("in range");
        assert_eq!(
            tbm.lookup_table().get(index),
            Some(LookupEntry { slot: 0, atlas: 1 })
        );
        assert_eq!(published_first_byte(&tbm, buckets[2]), Some(3));
        assert_eq!(tbm.data_textures()[1].slot_bytes(0)[0], 3);
    }

    #[test]
    fn test_out_of_range_bucket_not_assigned() {
        let mut tbm = manager(4, 1);
        let anchor = addr([0, 0, 0, 0]);
        let far = addr([10, 0, 0, 0]);
        let summary = tbm
            .set_active_buckets(&[anchor, far], anchor)
            .expect("set up");
        assert_eq!(summary.out_of_range, 1);
        assert_eq!(tbm.slot_of(far), None);

        // Moving the anchor brings it into range.
        tbm.set_active_buckets(&[anchor, far], addr([8, 0, 0, 0]))
            .expect("set up");
        assert!(tbm.slot_of(far).is_some());
    }

    #[test]
    fn test_anchor_move_releases_out_of_range_slot() {
        let mut tbm = manager(1, 1);
        let a = addr([0, 0, 0, 0]);
        let b = addr([20, 0, 0, 0]);
        build_bucket(&mut tbm, a, 3);
        set_active_buckets_and_wait(&mut tbm, &[a], a);
        assert_eq!(tbm.slot_of(a), Some(0));

        // `a` stays active but falls behind the new anchor.
        let summary = tbm.set_active_buckets(&[a, b], b).expect("set up");
        assert_eq!(summary.out_of_range, 1);
        assert_eq!(summary.assigned, 1);
        assert_eq!(summary.over_capacity, 0);
        assert_eq!(tbm.slot_of(a), None);
        assert_eq!(tbm.slot_of(b), Some(0));
        assert!(tbm.cube().get(&a).is_some_and(|bucket| bucket.is_loaded()));

        // Back at the old anchor `a` is rewritten from its cached payload.
        let summary = tbm.set_active_buckets(&[a, b], a).expect("set up");
        assert_eq!(summary.out_of_range, 1);
        assert_eq!(tbm.slot_of(a), Some(0));
        assert_eq!(tbm.slot_of(b), None);
        assert_eq!(tbm.process_writer_queue().written, 1);
        assert_eq!(published_first_byte(&tbm, a), Some(3));
    }

    #[test]
    fn test_reassigned_slot_writes_only_new_owner() {
        let mut tbm = manager(1, 1);
        let anchor = addr([0, 0, 0, 0]);
        let a = addr([0, 0, 0, 0]);
        let b = addr([1, 0, 0, 0]);
        build_bucket(&mut tbm, a, 1);
        build_bucket(&mut tbm, b, 2);

        // `a` gets slot 0 but leaves before its write is drained.
        tbm.set_active_buckets(&[a], anchor).expect("set up");
        assert_eq!(tbm.pending_writes(), 1);
        tbm.set_active_buckets(&[b], anchor).expect("set up");
        assert_eq!(tbm.slot_of(b), Some(0));
        assert_eq!(tbm.pending_writes(), 1);

        let stats = tbm.process_writer_queue();
        assert_eq!(stats.written, 1);
        assert_eq!(stats.deferred, 0);
        assert_eq!(stats.remaining, 0);
        assert_eq!(tbm.data_textures()[0].slot_bytes(0)[0], 2);
        assert_eq!(published_first_byte(&tbm, b), Some(2));
    }

    #[test]
    fn test_unused_prefetch_is_dropped() {
        let mut tbm = manager(4, 1);
        let a = addr([0, 0, 0, 0]);
        let prefetch = addr([3, 3, 3, 0]);
        build_bucket(&mut tbm, prefetch, 9);

        let summary = tbm.set_active_buckets(&[a], a).expect("set up");
        assert_eq!(summary.expired, 0);
        assert_eq!(tbm.cube().len(), 2, "prefetch survives one reconciliation");

        let summary = tbm.set_active_buckets(&[a], a).expect("set up");
        assert_eq!(summary.expired, 1);
        assert!(tbm.cube().get(&prefetch).is_none());
        assert_eq!(tbm.cube().len(), 1);

        // Speculative pulls every frame don't grow the cube.
        for frame in 0..50 {
            build_bucket(&mut tbm, addr([frame, 0, 5, 0]), 1);
            tbm.set_active_buckets(&[a], a).expect("set up");
            assert!(tbm.cube().len() <= 2);
        }
    }

    #[test]
    fn test_far_address_is_out_of_range() {
        let mut tbm = manager(2, 1);
        let anchor = addr([-5, 0, 0, 0]);
        let far = addr([i32::MAX, 0, 0, 0]);
        let summary = tbm
            .set_active_buckets(&[anchor, far], anchor)
            .expect("set up");
        assert_eq!(summary.out_of_range, 1);
        assert_eq!(tbm.slot_of(far), None);
        assert_eq!(tbm.bucket_index(far), None);
    }

    #[test]
    fn test_budget_bounds_writes_per_call() {
        let mut tbm = TextureBucketManager::new(
            CacheConfig {
                writes_per_frame: 1,
                ..config(4)
            },
            CpuAtlasBackend,
        )
        .expect("config");
        tbm.setup_data_textures(1).expect("setup");
        let buckets = [addr([0, 0, 0, 0]), addr([1, 0, 0, 0]), addr([2, 0, 0, 0])];
        for b in &buckets {
            build_bucket(&mut tbm, *b, 1);
        }
        tbm.set_active_buckets(&buckets, buckets[0]).expect("set up");

        let remaining: Vec<u32> = (0..3)
            .map(|_| {
                let stats = tbm.process_writer_queue();
                assert_eq!(stats.written, 1);
                stats.remaining
            })
            .collect();
        assert_eq!(remaining, vec![2, 1, 0]);
    }

    #[test]
    fn test_coarser_level_bucket_gets_own_entry() {
        let mut tbm = TextureBucketManager::new(
            CacheConfig {
                level_count: 2,
                ..config(4)
            },
            CpuAtlasBackend,
        )
        .expect("config");
        tbm.setup_data_textures(1).expect("setup");
        let fine = addr([2, 2, 2, 0]);
        let coarse = addr([1, 1, 1, 1]);
        build_bucket(&mut tbm, fine, 5);
        build_bucket(&mut tbm, coarse, 6);
        set_active_buckets_and_wait(&mut tbm, &[fine, coarse], addr([2, 2, 2, 0]));
        assert_eq!(published_first_byte(&tbm, fine), Some(5));
        assert_eq!(published_first_byte(&tbm, coarse), Some(6));
    }

    /// Small deterministic LCG so the sequence is reproducible.
    struct Lcg(u64);

    impl Lcg {
        fn next_u32(&mut self) -> u32 {
            self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (self.0 >> 33) as u32
        }
    }

    fn marker(address: ZoomedAddress) -> u8 {
        let p = address.position;
        (p.x * 16 + p.y * 4 + p.z + 1) as u8
    }

    #[test]
    fn test_slot_uniqueness_under_random_navigation() {
        let mut tbm = manager(5, 2);
        let mut rng = Lcg(0x5eed);

        for _step in 0..200 {
            let anchor = addr([(rng.next_u32() % 3) as i32, (rng.next_u32() % 3) as i32, 0, 0]);
            let count = rng.next_u32() % 14;
            let buckets: Vec<ZoomedAddress> = (0..count)
                .map(|_| {
                    addr([
                        (rng.next_u32() % 6) as i32,
                        (rng.next_u32() % 6) as i32,
                        (rng.next_u32() % 2) as i32,
                        0,
                    ])
                })
                .collect();

            tbm.set_active_buckets(&buckets, anchor).expect("set up");
            for ticket in tbm.request_missing() {
                if rng.next_u32() % 4 != 0 {
                    tbm.receive_data(ticket, payload(marker(ticket.address)))
                        .expect("payload");
                }
            }
            tbm.process_writer_queue_with_budget((rng.next_u32() % 6) as usize);

            // Assigned slots are distinct.
            let mut slots = HashSet::new();
            for b in tbm.active_buckets() {
                if let Some(slot) = tbm.slot_of(*b) {
                    assert!(slots.insert(slot), "slot {} assigned twice", slot);
                }
            }
            assert!(slots.len() as u32 <= tbm.capacity());

            // Published entries are distinct and hold their own bucket's data.
            let mut physical = HashSet::new();
            let space = tbm.config().address_space();
            for (index, entry) in tbm.lookup_table().entries().iter().enumerate() {
                if !entry.is_resident() {
                    continue;
                }
                assert!(physical.insert((entry.atlas, entry.slot)));
                let address = space
                    .address_at(tbm.anchor(), index as u32)
                    .expect("index in range");
                assert!(tbm.active_buckets().contains(&address));
                assert_eq!(published_first_byte(&tbm, address), Some(marker(address)));
            }
        }
    }
}
