use core::fmt::Debug;

use rand::RngCore;

use crate::codec::Bytes;
use crate::codec::Codec;
use crate::codec::Fixed;
use crate::codec::IntKey;
use crate::codec::KeyCodec;
use crate::config::StrLimits;
use crate::error::Error;
use crate::occupancy::Occupancy;
use crate::probe_bound::ProbeBounds;
use crate::slot_store::SlotStore;

/// Smallest bucket count a table ever has.
pub const MIN_BUCKETS: usize = 32;

/// Live entries allowed in a table of `buckets` buckets: `floor(0.79 * n)`.
#[inline(always)]
pub(crate) fn grow_threshold(buckets: usize) -> usize {
    ((buckets as u128 * 79) / 100) as usize
}

/// Open-addressing key-value table with group-wise probe bounds.
///
/// `K` and `V` select how keys and values are stored: [`Fixed`] for scalars
/// and [`Bytes`] for length-bounded byte strings. Lookups start at the key's
/// home bucket and probe linearly, giving up once they pass the probe bound
/// recorded for the home bucket's group of 32.
///
/// The table grows (doubling) before an insert that would exceed 79% load and
/// halves after a delete that leaves it at most 25% full, never going below
/// 32 buckets.
///
/// # Examples
///
/// ```rust
/// use psl_map::I32I64Table;
///
/// let mut table = I32I64Table::default();
/// assert!(table.set(7, 70).unwrap());
/// assert!(!table.set(7, 71).unwrap());
///
/// assert_eq!(table.get(7), Some(71));
/// assert_eq!(table.delete(7).unwrap(), Some(71));
/// assert!(table.is_empty());
/// ```
pub struct Table<K: KeyCodec, V: Codec> {
    pub(crate) key_codec: K,
    pub(crate) value_codec: V,

    pub(crate) keys: K::Store,
    pub(crate) values: V::Store,
    pub(crate) occupancy: Occupancy,
    pub(crate) bounds: ProbeBounds,

    pub(crate) buckets: usize,
    pub(crate) populated: usize,
    pub(crate) grow_at: usize,
    pub(crate) seed: u64,
}

impl<K: KeyCodec, V: Codec> Clone for Table<K, V> {
    fn clone(&self) -> Self {
        Self {
            key_codec: self.key_codec.clone(),
            value_codec: self.value_codec.clone(),
            keys: self.keys.clone(),
            values: self.values.clone(),
            occupancy: self.occupancy.clone(),
            bounds: self.bounds.clone(),
            buckets: self.buckets,
            populated: self.populated,
            grow_at: self.grow_at,
            seed: self.seed,
        }
    }
}

impl<K: KeyCodec, V: Codec> Debug for Table<K, V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<T: IntKey, V: Codec + Default> Default for Table<Fixed<T>, V> {
    /// An empty integer-keyed table. Integer keys hash by identity, so no
    /// seed is drawn.
    fn default() -> Self {
        match Self::with_seed(Fixed::new(), V::default(), 0) {
            Ok(table) => table,
            Err(err) => panic!("allocating an empty table failed: {err}"),
        }
    }
}

impl<K: KeyCodec, V: Codec> Table<K, V> {
    /// Creates an empty table whose byte-string hashing uses `seed`.
    ///
    /// The seed is ignored by integer keys.
    pub fn with_seed(key_codec: K, value_codec: V, seed: u64) -> Result<Self, Error> {
        Ok(Self {
            keys: key_codec.new_store(MIN_BUCKETS)?,
            values: value_codec.new_store(MIN_BUCKETS)?,
            occupancy: Occupancy::try_new(MIN_BUCKETS)?,
            bounds: ProbeBounds::try_new(MIN_BUCKETS)?,
            key_codec,
            value_codec,
            buckets: MIN_BUCKETS,
            populated: 0,
            grow_at: grow_threshold(MIN_BUCKETS),
            seed,
        })
    }

    /// Creates an empty table, drawing its hash seed from `rng`.
    pub fn with_rng<R: RngCore + ?Sized>(
        key_codec: K,
        value_codec: V,
        rng: &mut R,
    ) -> Result<Self, Error> {
        Self::with_seed(key_codec, value_codec, rng.next_u64())
    }

    /// Creates an empty table seeded from operating system randomness.
    #[cfg(feature = "std")]
    pub fn new(key_codec: K, value_codec: V) -> Result<Self, Error> {
        use rand::TryRngCore;

        let seed = rand::rngs::OsRng
            .try_next_u64()
            .map_err(|_| Error::SeedUnavailable)?;
        Self::with_seed(key_codec, value_codec, seed)
    }

    #[inline(always)]
    pub(crate) fn mask(&self) -> usize {
        self.buckets - 1
    }

    #[inline(always)]
    pub(crate) fn home_of(&self, key: K::Item<'_>) -> usize {
        self.key_codec.home_bucket(key, self.seed, self.mask())
    }

    /// Index of the bucket holding `key`, if any.
    ///
    /// Empty buckets do not end the search: deletions leave holes, so only
    /// the group's probe bound decides absence.
    fn find_index(&self, key: K::Item<'_>) -> Option<usize> {
        let mask = self.mask();
        let home = self.home_of(key);
        let bound = self.bounds.get(home);

        let mut index = home;
        let mut step = 0;
        loop {
            if !self.occupancy.is_empty(index)
                && self
                    .key_codec
                    .equals(self.key_codec.decode(&self.keys, index), key)
            {
                return Some(index);
            }

            step += 1;
            if step > bound {
                return None;
            }
            index = (home + step) & mask;
        }
    }

    /// First empty bucket at or after `home`, with its distance from `home`.
    fn find_vacant(&self, home: usize) -> Result<(usize, usize), Error> {
        let mask = self.mask();
        let mut index = home;
        let mut step = 0;
        while !self.occupancy.is_empty(index) {
            step += 1;
            if step >= self.buckets {
                log::error!(
                    "probe from bucket {home} exhausted {} buckets holding {} entries",
                    self.buckets,
                    self.populated
                );
                return Err(Error::ProbeExhausted {
                    buckets: self.buckets,
                });
            }
            index = (home + step) & mask;
        }

        Ok((index, step))
    }

    /// Returns the value stored for `key`.
    ///
    /// Byte-string values are borrowed from the table and stay valid until
    /// the next mutation.
    pub fn get(&self, key: K::Item<'_>) -> Option<V::Item<'_>> {
        self.find_index(key)
            .map(|index| self.value_codec.decode(&self.values, index))
    }

    /// Returns `true` if `key` is present.
    pub fn contains(&self, key: K::Item<'_>) -> bool {
        self.find_index(key).is_some()
    }

    /// Inserts or updates `key`.
    ///
    /// Returns `true` if a new entry was created and `false` if an existing
    /// value was overwritten. Over-long keys or values are rejected before
    /// anything is modified; a failed grow leaves the table as it was.
    pub fn set(&mut self, key: K::Item<'_>, value: V::Item<'_>) -> Result<bool, Error> {
        self.key_codec.validate(key)?;
        self.value_codec.validate(value)?;

        if let Some(index) = self.find_index(key) {
            self.value_codec.encode(&mut self.values, index, value)?;
            return Ok(false);
        }

        if self.populated >= self.grow_at {
            self.resize(self.buckets * 2)?;
        }

        let home = self.home_of(key);
        let (index, step) = self.find_vacant(home)?;
        self.key_codec.encode(&mut self.keys, index, key)?;
        self.value_codec.encode(&mut self.values, index, value)?;
        self.occupancy.set_occupied(index);
        self.bounds.raise(home, step);
        self.populated += 1;

        Ok(true)
    }

    /// Removes `key`, returning its value.
    ///
    /// May halve the table afterwards. If that shrink cannot allocate, the
    /// table keeps its current size and the removed value is still returned.
    pub fn delete(&mut self, key: K::Item<'_>) -> Result<Option<V::Owned>, Error> {
        let Some(index) = self.find_index(key) else {
            return Ok(None);
        };

        let value = self
            .value_codec
            .into_owned(self.value_codec.decode(&self.values, index));
        self.occupancy.set_empty(index);
        self.populated -= 1;

        self.maybe_shrink();
        Ok(Some(value))
    }

    /// Deletes every key in `keys` that is present, returning how many were
    /// removed.
    pub fn delete_many<'k, I>(&mut self, keys: I) -> Result<usize, Error>
    where
        I: IntoIterator<Item = K::Item<'k>>,
    {
        let mut removed = 0;
        for key in keys {
            if self.delete(key)?.is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Applies [`set`](Self::set) to every pair of `source` in order, so later
    /// duplicates win. Stops at the first error; pairs before it stay applied.
    pub fn merge<'s, I>(&mut self, source: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = (K::Item<'s>, V::Item<'s>)>,
    {
        for (key, value) in source {
            self.set(key, value)?;
        }
        Ok(())
    }

    fn maybe_shrink(&mut self) {
        if self.buckets > MIN_BUCKETS && self.populated <= self.buckets / 4 {
            self.resize_or_keep(self.buckets / 2);
        }
    }

    /// Resizes to `buckets`, staying at the current size if that fails.
    /// Returns whether the resize happened.
    pub(crate) fn resize_or_keep(&mut self, buckets: usize) -> bool {
        match self.resize(buckets) {
            Ok(()) => true,
            Err(err) => {
                log::warn!(
                    "resizing {} buckets holding {} entries to {buckets} failed: {err}",
                    self.buckets,
                    self.populated
                );
                false
            }
        }
    }

    /// Removes every entry and returns to the minimum bucket count.
    ///
    /// The seed is kept. Never allocates; buffers keep their capacity.
    pub fn clear(&mut self) {
        self.keys.set_buckets(MIN_BUCKETS);
        self.values.set_buckets(MIN_BUCKETS);
        self.occupancy.reset(MIN_BUCKETS);
        self.bounds.reset(MIN_BUCKETS);
        self.buckets = MIN_BUCKETS;
        self.populated = 0;
        self.grow_at = grow_threshold(MIN_BUCKETS);
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.populated
    }

    /// Returns `true` if the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.populated == 0
    }

    /// Number of buckets currently allocated. Always a power of two, at least
    /// 32.
    pub fn bucket_count(&self) -> usize {
        self.buckets
    }

    /// Number of entries the table holds before the next insert grows it.
    pub fn capacity(&self) -> usize {
        self.grow_at
    }

    /// Iterates over all entries in ascending bucket order.
    ///
    /// The table cannot be modified while the iterator is alive.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            table: self,
            index: 0,
            remaining: self.populated,
        }
    }

    /// Iterates over all keys in bucket order.
    pub fn keys(&self) -> impl ExactSizeIterator<Item = K::Item<'_>> + '_ {
        self.iter().map(|(key, _)| key)
    }

    /// Iterates over all values in bucket order.
    pub fn values(&self) -> impl ExactSizeIterator<Item = V::Item<'_>> + '_ {
        self.iter().map(|(_, value)| value)
    }

    /// Returns a snapshot of the table's occupancy and probe statistics.
    #[cfg(any(test, feature = "stats"))]
    pub fn stats(&self) -> TableStats {
        let mask = self.mask();
        let mut probe_histogram = alloc::vec::Vec::new();
        for index in 0..self.buckets {
            if self.occupancy.is_empty(index) {
                continue;
            }

            let home = self.home_of(self.key_codec.decode(&self.keys, index));
            let distance = index.wrapping_sub(home) & mask;
            if probe_histogram.len() <= distance {
                probe_histogram.resize(distance + 1, 0);
            }
            probe_histogram[distance] += 1;
        }

        TableStats {
            populated: self.populated,
            occupied_slots: self.occupancy.occupied(),
            buckets: self.buckets,
            capacity: self.grow_at,
            load_factor: self.populated as f64 / self.buckets as f64,
            max_probe_bound: self.bounds.max(),
            probe_histogram,
        }
    }
}

impl Table<Bytes, Bytes> {
    /// Creates an empty byte-string table after checking `limits`.
    ///
    /// Out-of-range limits are rejected before anything is allocated.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use psl_map::Error;
    /// use psl_map::StrLimits;
    /// use psl_map::StrTable;
    /// use rand::SeedableRng;
    /// use rand::rngs::SmallRng;
    ///
    /// let mut rng = SmallRng::seed_from_u64(1);
    /// let mut table = StrTable::with_limits(StrLimits::new(5, 5), &mut rng).unwrap();
    ///
    /// table.set(b"hello", b"world").unwrap();
    /// assert_eq!(table.get(b"hello"), Some(&b"world"[..]));
    /// assert!(matches!(
    ///     table.set(b"toolong1", b"x"),
    ///     Err(Error::ValueTooLong { .. })
    /// ));
    /// ```
    pub fn with_limits<R: RngCore + ?Sized>(limits: StrLimits, rng: &mut R) -> Result<Self, Error> {
        let (keys, values) = limits.codecs()?;
        Self::with_rng(keys, values, rng)
    }
}

impl<'a, K: KeyCodec, V: Codec> IntoIterator for &'a Table<K, V> {
    type Item = (K::Item<'a>, V::Item<'a>);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the entries of a [`Table`], created by [`Table::iter`].
pub struct Iter<'a, K: KeyCodec, V: Codec> {
    table: &'a Table<K, V>,
    index: usize,
    remaining: usize,
}

impl<'a, K: KeyCodec, V: Codec> Iterator for Iter<'a, K, V> {
    type Item = (K::Item<'a>, V::Item<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let table = self.table;
        while self.index < table.buckets {
            let index = self.index;
            self.index += 1;
            if !table.occupancy.is_empty(index) {
                self.remaining -= 1;
                return Some((
                    table.key_codec.decode(&table.keys, index),
                    table.value_codec.decode(&table.values, index),
                ));
            }
        }

        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K: KeyCodec, V: Codec> ExactSizeIterator for Iter<'_, K, V> {}

impl<K: KeyCodec, V: Codec> core::iter::FusedIterator for Iter<'_, K, V> {}

/// Occupancy and probe statistics of a table.
///
/// Available with the `stats` feature.
#[cfg(any(test, feature = "stats"))]
#[derive(Debug, Clone)]
pub struct TableStats {
    /// Number of live entries.
    pub populated: usize,
    /// Number of buckets marked occupied; always equal to `populated`.
    pub occupied_slots: usize,
    /// Number of buckets.
    pub buckets: usize,
    /// Live entries allowed before the next grow.
    pub capacity: usize,
    /// `populated / buckets`.
    pub load_factor: f64,
    /// Largest probe bound over all 32-bucket groups.
    pub max_probe_bound: usize,
    /// `probe_histogram[d]` counts live entries stored `d` buckets past their
    /// home bucket.
    pub probe_histogram: alloc::vec::Vec<usize>,
}

#[cfg(feature = "stats")]
impl TableStats {
    /// Pretty-print the statistics.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== Table Statistics ===");
        println!(
            "Population: {}/{} buckets ({:.2}% load, grows at {})",
            self.populated,
            self.buckets,
            self.load_factor * 100.0,
            self.capacity
        );
        println!("Max probe bound: {}", self.max_probe_bound);
        for (distance, count) in self.probe_histogram.iter().enumerate() {
            println!("{distance:>4} | {count}");
        }
    }
}
