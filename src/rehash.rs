//! Resizing a table in place.
//!
//! Every buffer the resize needs is allocated before the first record moves,
//! so a failed allocation leaves the table exactly as it was. Records are then
//! permuted inside the existing key and value stores, which grow before the
//! move and are truncated after it.
//!
//! Two relocation strategies exist. When both roles are fixed-width, an
//! entry is carried in its starting slot and swapped with whatever unmigrated
//! entry occupies its destination. Byte-string records instead walk the whole
//! displacement chain first, then copy records backward along it so that each
//! one is read before it is overwritten.

use alloc::vec::Vec;

use crate::codec::Codec;
use crate::codec::KeyCodec;
use crate::error::Error;
use crate::occupancy::Occupancy;
use crate::probe_bound::ProbeBounds;
use crate::slot_store::SlotStore;
use crate::table::MIN_BUCKETS;
use crate::table::Table;
use crate::table::grow_threshold;

/// Occupancy and probe bounds of the table being built.
struct Target {
    occupancy: Occupancy,
    bounds: ProbeBounds,
    mask: usize,
}

/// Buffers for path relocation, allocated up front.
struct PathScratch<KS: SlotStore, VS: SlotStore> {
    visits: Vec<usize>,
    key: KS::Scratch,
    value: VS::Scratch,
}

impl<KS: SlotStore, VS: SlotStore> PathScratch<KS, VS> {
    fn try_new(old_buckets: usize, keys: &KS, values: &VS) -> Result<Self, Error> {
        // A chain holds its start plus at most one slot per live entry.
        let len = old_buckets + 1;
        let mut visits = Vec::new();
        visits
            .try_reserve_exact(len)
            .map_err(|_| Error::AllocationFailure {
                bytes: len * core::mem::size_of::<usize>(),
            })?;

        Ok(Self {
            visits,
            key: keys.try_scratch()?,
            value: values.try_scratch()?,
        })
    }
}

impl<K: KeyCodec, V: Codec> Table<K, V> {
    /// Rebuilds the table with `new_buckets` buckets.
    pub(crate) fn resize(&mut self, new_buckets: usize) -> Result<(), Error> {
        let new_buckets = new_buckets.max(MIN_BUCKETS);
        debug_assert!(new_buckets.is_power_of_two());
        debug_assert!(self.populated <= grow_threshold(new_buckets));

        let old_buckets = self.buckets;
        debug_assert_eq!(self.keys.buckets(), old_buckets);
        debug_assert_eq!(self.values.buckets(), old_buckets);
        let mut target = Target {
            occupancy: Occupancy::try_new(new_buckets)?,
            bounds: ProbeBounds::try_new(new_buckets)?,
            mask: new_buckets - 1,
        };
        let fixed_width = K::FIXED_WIDTH && V::FIXED_WIDTH;
        let mut path = if fixed_width {
            None
        } else {
            Some(PathScratch::try_new(old_buckets, &self.keys, &self.values)?)
        };
        if new_buckets > old_buckets {
            self.keys.try_reserve_buckets(new_buckets)?;
            self.values.try_reserve_buckets(new_buckets)?;
        }

        log::debug!(
            "resizing table from {old_buckets} to {new_buckets} buckets ({} entries, {} relocation)",
            self.populated,
            if fixed_width { "swap" } else { "path" },
        );

        // Nothing below allocates.
        if new_buckets > old_buckets {
            self.keys.set_buckets(new_buckets);
            self.values.set_buckets(new_buckets);
        }

        match path.as_mut() {
            None => self.relocate_by_swap(old_buckets, &mut target),
            Some(path) => self.relocate_by_path(old_buckets, &mut target, path),
        }

        if new_buckets < old_buckets {
            self.keys.set_buckets(new_buckets);
            self.values.set_buckets(new_buckets);
        }

        self.occupancy = target.occupancy;
        self.bounds = target.bounds;
        self.buckets = new_buckets;
        self.grow_at = grow_threshold(new_buckets);

        Ok(())
    }

    /// Claims a bucket in `target` for the entry whose key sits in `index`,
    /// raising the probe bound of its new home group as needed.
    fn claim(&self, index: usize, target: &mut Target) -> usize {
        let key = self.key_codec.decode(&self.keys, index);
        let home = self.key_codec.home_bucket(key, self.seed, target.mask);

        let mut slot = home;
        let mut step = 0;
        while !target.occupancy.is_empty(slot) {
            step += 1;
            slot = (home + step) & target.mask;
        }

        target.occupancy.set_occupied(slot);
        target.bounds.raise(home, step);
        slot
    }

    /// `self.occupancy` doubles as the set of entries not yet migrated: a
    /// bucket is cleared from it once its entry has been picked up.
    fn relocate_by_swap(&mut self, old_buckets: usize, target: &mut Target) {
        for start in 0..old_buckets {
            if self.occupancy.is_empty(start) {
                continue;
            }
            self.occupancy.set_empty(start);

            // The entry in flight always lives in `start`.
            loop {
                let slot = self.claim(start, target);
                if slot == start {
                    break;
                }

                if slot < old_buckets && !self.occupancy.is_empty(slot) {
                    self.keys.swap_slots(start, slot);
                    self.values.swap_slots(start, slot);
                    self.occupancy.set_empty(slot);
                } else {
                    self.keys.copy_slot(start, slot);
                    self.values.copy_slot(start, slot);
                    break;
                }
            }
        }
    }

    fn relocate_by_path(
        &mut self,
        old_buckets: usize,
        target: &mut Target,
        path: &mut PathScratch<K::Store, V::Store>,
    ) {
        for start in 0..old_buckets {
            if self.occupancy.is_empty(start) {
                continue;
            }
            self.occupancy.set_empty(start);

            // Forward pass: visits[i + 1] is where the entry found in
            // visits[i] belongs. The chain ends at a slot that held no
            // unmigrated entry, which may be `start` itself.
            path.visits.clear();
            path.visits.push(start);
            let mut current = start;
            loop {
                let slot = self.claim(current, target);
                path.visits.push(slot);

                if slot < old_buckets && !self.occupancy.is_empty(slot) {
                    self.occupancy.set_empty(slot);
                    current = slot;
                } else {
                    break;
                }
            }

            let last = path.visits.len() - 1;
            let cycle = last > 1 && path.visits[last] == start;
            if cycle {
                self.keys.save(start, &mut path.key);
                self.values.save(start, &mut path.value);
            }

            // Backward pass.
            for i in (2..=last).rev() {
                let (src, dst) = (path.visits[i - 1], path.visits[i]);
                self.keys.copy_slot(src, dst);
                self.values.copy_slot(src, dst);
            }

            let first = path.visits[1];
            if cycle {
                self.keys.restore(first, &path.key);
                self.values.restore(first, &path.value);
            } else {
                self.keys.copy_slot(start, first);
                self.values.copy_slot(start, first);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::format;
    use alloc::string::String;
    use alloc::vec::Vec;

    use rand::Rng;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use rand::seq::SliceRandom;

    use crate::Bytes;
    use crate::Error;
    use crate::Fixed;
    use crate::Table;

    fn assert_consistent<K: crate::KeyCodec, V: crate::Codec>(table: &Table<K, V>) {
        let stats = table.stats();
        assert_eq!(stats.occupied_slots, table.len());
        assert!(table.bucket_count().is_power_of_two());
        assert!(table.bucket_count() >= 32);
        assert!(table.len() <= table.capacity());

        // Every live entry must be reachable within its group's bound.
        let mask = table.mask();
        for index in 0..table.bucket_count() {
            if table.occupancy.is_empty(index) {
                continue;
            }
            let home = table.home_of(table.key_codec.decode(&table.keys, index));
            let distance = index.wrapping_sub(home) & mask;
            assert!(
                distance <= table.bounds.get(home),
                "entry in bucket {index} is {distance} from home {home}, bound {}",
                table.bounds.get(home)
            );
        }
    }

    #[test]
    fn swap_grow_preserves_entries() {
        let mut table: Table<Fixed<i64>, Fixed<i64>> = Table::default();
        for k in 0..1000i64 {
            table.set(k * 7, k).unwrap();
        }
        assert_consistent(&table);
        assert_eq!(table.len(), 1000);
        for k in 0..1000i64 {
            assert_eq!(table.get(k * 7), Some(k));
        }
    }

    #[test]
    fn swap_shrink_preserves_entries() {
        let mut table: Table<Fixed<i32>, Fixed<i32>> = Table::default();
        for k in 0..512 {
            table.set(k, -k).unwrap();
        }
        let grown = table.bucket_count();

        for k in 16..512 {
            assert_eq!(table.delete(k).unwrap(), Some(-k));
        }
        assert!(table.bucket_count() < grown);
        assert_consistent(&table);
        for k in 0..16 {
            assert_eq!(table.get(k), Some(-k));
        }
    }

    #[test]
    fn colliding_keys_displace_across_resizes() {
        // Multiples of 32 share a home bucket at the minimum size and spread
        // out as the table grows.
        let mut table: Table<Fixed<i32>, Fixed<i64>> = Table::default();
        for k in 0..200 {
            table.set(k * 32, k as i64).unwrap();
        }
        assert_consistent(&table);
        for k in 0..200 {
            assert_eq!(table.get(k * 32), Some(k as i64));
        }
    }

    #[test]
    fn negative_keys_survive_rehash() {
        let mut table: Table<Fixed<i64>, Fixed<f64>> = Table::default();
        for k in -300i64..300 {
            table.set(k, k as f64 / 2.0).unwrap();
        }
        assert_consistent(&table);
        for k in -300i64..300 {
            assert_eq!(table.get(k), Some(k as f64 / 2.0));
        }
    }

    #[test]
    fn path_grow_preserves_variable_records() {
        let mut table =
            Table::with_seed(Bytes::new(24).unwrap(), Bytes::new(40).unwrap(), 0x5eed).unwrap();
        let keys: Vec<_> = (0..800).map(|k| format!("key-{k}")).collect();
        let values: Vec<_> = (0..800).map(|k| "v".repeat(k % 40)).collect();

        for (k, v) in keys.iter().zip(&values) {
            assert!(table.set(k.as_bytes(), v.as_bytes()).unwrap());
        }
        assert_consistent(&table);
        for (k, v) in keys.iter().zip(&values) {
            assert_eq!(table.get(k.as_bytes()), Some(v.as_bytes()));
        }
    }

    #[test]
    fn path_shrink_preserves_variable_records() {
        let mut table =
            Table::with_seed(Bytes::new(16).unwrap(), Bytes::new(16).unwrap(), 42).unwrap();
        let keys: Vec<_> = (0..400).map(|k| format!("{k:x}")).collect();
        for k in &keys {
            table.set(k.as_bytes(), k.repeat(2).as_bytes()).unwrap();
        }
        let grown = table.bucket_count();

        for k in &keys[20..] {
            assert!(table.delete(k.as_bytes()).unwrap().is_some());
        }
        assert!(table.bucket_count() < grown);
        assert_consistent(&table);
        for k in &keys[..20] {
            assert_eq!(table.get(k.as_bytes()), Some(k.repeat(2).as_bytes()));
        }
    }

    #[test]
    fn mixed_roles_use_path_relocation() {
        let mut table = Table::with_seed(Fixed::<i32>::new(), Bytes::new(8).unwrap(), 0).unwrap();
        for k in 0..300 {
            table.set(k * 3, format!("{k}").as_bytes()).unwrap();
        }
        assert_consistent(&table);
        for k in 0..300 {
            assert_eq!(table.get(k * 3), Some(format!("{k}").as_bytes()));
        }

        let mut table = Table::with_seed(Bytes::new(8).unwrap(), Fixed::<i64>::new(), 9).unwrap();
        for k in 0..300i64 {
            table.set(format!("{k}").as_bytes(), k).unwrap();
        }
        for k in (0..300i64).step_by(2) {
            assert_eq!(table.delete(format!("{k}").as_bytes()).unwrap(), Some(k));
        }
        assert_consistent(&table);
        for k in (1..300i64).step_by(2) {
            assert_eq!(table.get(format!("{k}").as_bytes()), Some(k));
        }
    }

    #[test]
    fn explicit_resize_round_trip() {
        let mut table: Table<Fixed<i32>, Fixed<i32>> = Table::default();
        for k in 0..20 {
            table.set(k, k).unwrap();
        }

        table.resize(1024).unwrap();
        assert_eq!(table.bucket_count(), 1024);
        assert_consistent(&table);

        table.resize(32).unwrap();
        assert_eq!(table.bucket_count(), 32);
        assert_consistent(&table);
        for k in 0..20 {
            assert_eq!(table.get(k), Some(k));
        }
    }

    #[test]
    fn failed_grow_leaves_fixed_table_untouched() {
        let mut table: Table<Fixed<i64>, Fixed<i64>> = Table::default();
        for k in 0..200i64 {
            table.set(k * 5, -k).unwrap();
        }
        let buckets = table.bucket_count();

        assert!(matches!(
            table.resize(1 << 60),
            Err(Error::AllocationFailure { .. })
        ));
        assert_eq!(table.bucket_count(), buckets);
        assert_eq!(table.len(), 200);
        assert_consistent(&table);
        for k in 0..200i64 {
            assert_eq!(table.get(k * 5), Some(-k));
        }

        table.set(-1, 1).unwrap();
        assert_eq!(table.get(-1), Some(1));
    }

    #[test]
    fn failed_grow_leaves_byte_table_untouched() {
        let mut table =
            Table::with_seed(Bytes::new(16).unwrap(), Bytes::new(16).unwrap(), 77).unwrap();
        let keys: Vec<String> = (0..200).map(|k| format!("key{k}")).collect();
        for k in &keys {
            table.set(k.as_bytes(), k.as_bytes()).unwrap();
        }
        let buckets = table.bucket_count();

        assert!(matches!(
            table.resize(1 << 60),
            Err(Error::AllocationFailure { .. })
        ));
        assert_eq!(table.bucket_count(), buckets);
        assert_eq!(table.len(), keys.len());
        assert_consistent(&table);
        for k in &keys {
            assert_eq!(table.get(k.as_bytes()), Some(k.as_bytes()));
        }
    }

    #[test]
    fn same_size_resize_reorders_in_place() {
        // Same mask, so chains frequently end back on their own start.
        let mut table =
            Table::with_seed(Bytes::new(12).unwrap(), Bytes::new(12).unwrap(), 3).unwrap();
        for k in 0..25 {
            table.set(format!("k{k}").as_bytes(), format!("v{k}").as_bytes()).unwrap();
        }
        table.resize(32).unwrap();
        assert_consistent(&table);
        for k in 0..25 {
            assert_eq!(
                table.get(format!("k{k}").as_bytes()),
                Some(format!("v{k}").as_bytes())
            );
        }
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn random_churn_keeps_bounds_valid() {
        let mut rng = SmallRng::seed_from_u64(0xdead_beef);
        let mut table =
            Table::with_seed(Bytes::new(20).unwrap(), Bytes::new(20).unwrap(), rng.random())
                .unwrap();
        let mut live: Vec<String> = Vec::new();

        for round in 0..6 {
            for i in 0..500 {
                let key = format!("r{round}-{i}-{}", rng.random::<u16>());
                if table.set(key.as_bytes(), key.as_bytes()).unwrap() {
                    live.push(key);
                }
            }
            live.shuffle(&mut rng);
            let keep = live.len() / 5;
            for key in live.drain(keep..) {
                assert_eq!(
                    table.delete(key.as_bytes()).unwrap().as_deref(),
                    Some(key.as_bytes())
                );
            }
            assert_consistent(&table);
            assert_eq!(table.len(), live.len());
            for key in &live {
                assert_eq!(table.get(key.as_bytes()), Some(key.as_bytes()));
            }
        }
    }
}
