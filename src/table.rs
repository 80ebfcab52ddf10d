//! Concurrent open-addressing k-mer counting table.
//!
//! The table is a power-of-two array of slots. Each slot holds a packed key
//! and a state word:
//!
//! ```text
//!  63       62        61          W-1 .. 0
//! +-------+--------+-----------+-----~-----+
//! |CLAIMED|OCCUPIED|OVERFLOWED |  counter  |
//! +-------+--------+-----------+-----~-----+
//! ```
//!
//! An empty slot (state `0`) is claimed with a compare-and-swap, its key is
//! written, and only then is `OCCUPIED` published with release ordering, so a
//! reader that sees `OCCUPIED` always sees the key. Counters are `W` bits wide
//! (7 by default). The increment that would push a counter past `2^W - 1`
//! sets `OVERFLOWED` and moves the full count into a side map; every later
//! increment of that key goes to the side map.
//!
//! Keys are located by a triangular walk, `hash + i(i+1)/2`, over at most
//! `max_reprobe + 1` slots and never more than one pass over the table.
//! Exhausting the walk, or filling the table past `max_load`, doubles the
//! capacity. Growth takes the write half of a [`RwLock`] that every
//! increment holds shared, so a rehash always sees a complete and quiescent
//! array.
//!
//! The write phase ends with [`CountingTable::mark_done`], which consumes the
//! table and returns a read-only [`FrozenTable`].

use std::hash::BuildHasher;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use dashmap::DashMap;
use parking_lot::{RwLock, RwLockReadGuard};
use rustc_hash::{FxBuildHasher, FxHashMap};
use tracing::debug;

use crate::error::{KmerCovError, TableError};
use crate::kmer::Kmer;
use crate::stats::TableStats;

/// Default in-table counter width in bits.
pub const DEFAULT_COUNTER_BITS: u32 = 7;

/// Default number of reprobes before the table grows.
pub const DEFAULT_MAX_REPROBE: usize = 126;

/// Default occupancy ratio above which the table grows.
pub const DEFAULT_MAX_LOAD: f64 = 0.9;

/// Widest in-table counter the state word can hold.
pub const MAX_COUNTER_BITS: u32 = 32;

const CLAIMED: u64 = 1 << 63;
const OCCUPIED: u64 = 1 << 62;
const OVERFLOWED: u64 = 1 << 61;

/// Sizing and layout parameters of a [`CountingTable`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableConfig {
    initial_capacity: usize,
    counter_bits: u32,
    max_reprobe: usize,
    max_load: f64,
    max_capacity: Option<usize>,
}

impl TableConfig {
    /// Defaults with the given initial number of slots.
    pub const fn new(initial_capacity: usize) -> Self {
        Self {
            initial_capacity,
            counter_bits: DEFAULT_COUNTER_BITS,
            max_reprobe: DEFAULT_MAX_REPROBE,
            max_load: DEFAULT_MAX_LOAD,
            max_capacity: None,
        }
    }

    /// Width of the in-table counters (1-32 bits).
    #[must_use]
    pub const fn counter_bits(mut self, bits: u32) -> Self {
        self.counter_bits = bits;
        self
    }

    /// Number of reprobes tried before growing.
    #[must_use]
    pub const fn max_reprobe(mut self, reprobes: usize) -> Self {
        self.max_reprobe = reprobes;
        self
    }

    /// Occupancy ratio in `(0, 1]` above which the table grows.
    #[must_use]
    pub const fn max_load(mut self, load: f64) -> Self {
        self.max_load = load;
        self
    }

    /// Capacity the table may never grow beyond.
    #[must_use]
    pub const fn max_capacity(mut self, capacity: Option<usize>) -> Self {
        self.max_capacity = capacity;
        self
    }

    pub const fn get_initial_capacity(&self) -> usize {
        self.initial_capacity
    }

    pub const fn get_counter_bits(&self) -> u32 {
        self.counter_bits
    }

    pub const fn get_max_reprobe(&self) -> usize {
        self.max_reprobe
    }

    pub const fn get_max_load(&self) -> f64 {
        self.max_load
    }

    pub const fn get_max_capacity(&self) -> Option<usize> {
        self.max_capacity
    }

    /// Checks the settings and returns the initial capacity rounded up to a
    /// power of two.
    pub fn validate(&self) -> Result<usize, KmerCovError> {
        let invalid = |details: String| KmerCovError::InvalidConfig { details };

        if self.initial_capacity == 0 {
            return Err(invalid("initial hash size must be at least 1".into()));
        }
        if !(1..=MAX_COUNTER_BITS).contains(&self.counter_bits) {
            return Err(invalid(format!(
                "counter width {} is out of range: must be between 1 and {MAX_COUNTER_BITS} bits",
                self.counter_bits
            )));
        }
        if !(self.max_load > 0.0 && self.max_load <= 1.0) {
            return Err(invalid(format!(
                "maximum load {} is out of range: must be in (0, 1]",
                self.max_load
            )));
        }
        let capacity = self
            .initial_capacity
            .checked_next_power_of_two()
            .ok_or_else(|| invalid(format!("initial hash size {} is too large", self.initial_capacity)))?;
        if let Some(max) = self.max_capacity {
            if max < capacity {
                return Err(invalid(format!(
                    "maximum hash size {max} is smaller than the initial size {capacity}"
                )));
            }
        }
        Ok(capacity)
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self::new(1 << 20)
    }
}

#[inline]
fn hash(key: u64) -> u64 {
    FxBuildHasher.hash_one(key)
}

/// Slot indices `hash + i(i+1)/2` for `i` in `0..=max_reprobe`.
///
/// Triangular steps visit every slot of a power-of-two table within
/// `capacity` attempts, so the walk never exceeds one pass over the table.
fn slot_walk(hash: u64, max_reprobe: usize, capacity: usize) -> impl Iterator<Item = usize> {
    let mask = capacity - 1;
    #[allow(clippy::cast_possible_truncation)]
    let start = hash as usize & mask;
    (0..=max_reprobe.min(mask)).scan(start, move |index, attempt| {
        *index = index.wrapping_add(attempt) & mask;
        Some(*index)
    })
}

enum Slot {
    Found { index: usize, claimed: bool },
    Exhausted,
}

#[derive(Clone, Copy)]
enum GrowReason {
    Reprobe,
    Load,
}

struct Slots {
    keys: Box<[AtomicU64]>,
    states: Box<[AtomicU64]>,
    occupied: AtomicUsize,
}

impl Slots {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            keys: (0..capacity).map(|_| AtomicU64::new(0)).collect(),
            states: (0..capacity).map(|_| AtomicU64::new(0)).collect(),
            occupied: AtomicUsize::new(0),
        }
    }

    fn capacity(&self) -> usize {
        self.states.len()
    }

    fn find_or_claim(&self, key: u64, max_reprobe: usize) -> Slot {
        for index in slot_walk(hash(key), max_reprobe, self.capacity()) {
            let state = &self.states[index];
            loop {
                let current = state.load(Ordering::Acquire);
                if current & OCCUPIED != 0 {
                    if self.keys[index].load(Ordering::Relaxed) == key {
                        return Slot::Found {
                            index,
                            claimed: false,
                        };
                    }
                    break;
                }
                if current & CLAIMED != 0 {
                    // Another worker is publishing a key here.
                    std::hint::spin_loop();
                    continue;
                }
                if state
                    .compare_exchange_weak(0, CLAIMED, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
                {
                    self.keys[index].store(key, Ordering::Relaxed);
                    state.store(OCCUPIED, Ordering::Release);
                    self.occupied.fetch_add(1, Ordering::Relaxed);
                    return Slot::Found {
                        index,
                        claimed: true,
                    };
                }
            }
        }
        Slot::Exhausted
    }

    fn add(
        &self,
        index: usize,
        key: u64,
        delta: u64,
        counter_mask: u64,
        overflow: &DashMap<u64, u64, FxBuildHasher>,
    ) {
        let state = &self.states[index];
        let mut current = state.load(Ordering::Relaxed);
        loop {
            if current & OVERFLOWED != 0 {
                *overflow.entry(key).or_insert(0) += delta;
                return;
            }
            let count = current & counter_mask;
            match count.checked_add(delta).filter(|&n| n <= counter_mask) {
                Some(next) => {
                    let updated = (current & !counter_mask) | next;
                    match state.compare_exchange_weak(
                        current,
                        updated,
                        Ordering::AcqRel,
                        Ordering::Relaxed,
                    ) {
                        Ok(_) => return,
                        Err(actual) => current = actual,
                    }
                }
                None => {
                    // Promote: the frozen field value moves to the overflow record.
                    match state.compare_exchange_weak(
                        current,
                        current | OVERFLOWED,
                        Ordering::AcqRel,
                        Ordering::Relaxed,
                    ) {
                        Ok(_) => {
                            *overflow.entry(key).or_insert(0) += count.saturating_add(delta);
                            return;
                        }
                        Err(actual) => current = actual,
                    }
                }
            }
        }
    }

    fn over_loaded(&self, max_load: f64) -> bool {
        #[allow(clippy::cast_precision_loss)]
        let load = self.occupied.load(Ordering::Relaxed) as f64 / self.capacity() as f64;
        load > max_load
    }

    /// Rebuilds into `capacity` slots, or `None` if some key cannot be placed
    /// within the reprobe limit. Overflow records whose counts fit back into a
    /// counter are returned for removal; the map itself is left untouched
    /// until the rehash is known to succeed.
    fn rehash(
        &self,
        capacity: usize,
        counter_mask: u64,
        max_reprobe: usize,
        overflow: &DashMap<u64, u64, FxBuildHasher>,
    ) -> Option<(Self, Vec<u64>)> {
        let grown = Self::with_capacity(capacity);
        let mut demoted = Vec::new();

        for (key, state) in self.keys.iter().zip(self.states.iter()) {
            let state = state.load(Ordering::Relaxed);
            if state & OCCUPIED == 0 {
                continue;
            }
            let key = key.load(Ordering::Relaxed);
            let total = if state & OVERFLOWED != 0 {
                overflow.get(&key).map_or(0, |count| *count)
            } else {
                state & counter_mask
            };

            let Slot::Found { index, .. } = grown.find_or_claim(key, max_reprobe) else {
                return None;
            };
            let new_state = if total <= counter_mask {
                if state & OVERFLOWED != 0 {
                    demoted.push(key);
                }
                OCCUPIED | total
            } else {
                OCCUPIED | OVERFLOWED | counter_mask
            };
            grown.states[index].store(new_state, Ordering::Relaxed);
        }
        Some((grown, demoted))
    }
}

/// The writable counting table shared by all ingestion workers.
///
/// `CountingTable` is `Sync`; workers share it by reference and call
/// [`increment`](Self::increment) concurrently. Increments of different keys
/// never block each other except while the table grows.
pub struct CountingTable {
    slots: RwLock<Slots>,
    overflow: DashMap<u64, u64, FxBuildHasher>,
    counter_mask: u64,
    max_reprobe: usize,
    max_load: f64,
    max_capacity: Option<usize>,
    resizes: AtomicUsize,
}

impl CountingTable {
    /// Creates an empty table. The initial capacity is rounded up to a power
    /// of two.
    ///
    /// # Example
    ///
    /// ```rust
    /// use kmercov::kmer::Kmer;
    /// use kmercov::table::{CountingTable, TableConfig};
    ///
    /// let table = CountingTable::new(TableConfig::new(1000))?;
    /// assert_eq!(table.capacity(), 1024);
    ///
    /// let acgt = Kmer::encode(b"ACGT").unwrap();
    /// table.increment(acgt, 3)?;
    /// let frozen = table.mark_done();
    /// assert_eq!(frozen.lookup(acgt), Some(3));
    /// # Ok::<(), kmercov::error::KmerCovError>(())
    /// ```
    pub fn new(config: TableConfig) -> Result<Self, KmerCovError> {
        let capacity = config.validate()?;
        Ok(Self {
            slots: RwLock::new(Slots::with_capacity(capacity)),
            overflow: DashMap::with_hasher(FxBuildHasher),
            counter_mask: (1u64 << config.counter_bits) - 1,
            max_reprobe: config.max_reprobe,
            max_load: config.max_load,
            max_capacity: config.max_capacity,
            resizes: AtomicUsize::new(0),
        })
    }

    /// Adds `delta` to the count of `kmer`, inserting it if absent.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::CapacityExceeded`] if the key cannot be placed
    /// without growing past the configured maximum capacity.
    pub fn increment(&self, kmer: Kmer, delta: u64) -> Result<(), TableError> {
        self.add_all(std::iter::once(kmer), delta).map(|_| ())
    }

    /// Adds one to the count of every key, holding the shared guard across
    /// the batch. Returns the number of keys counted.
    ///
    /// # Errors
    ///
    /// Same as [`increment`](Self::increment); keys before the failing one
    /// remain counted.
    pub fn increment_all<I>(&self, kmers: I) -> Result<u64, TableError>
    where
        I: IntoIterator<Item = Kmer>,
    {
        self.add_all(kmers, 1)
    }

    fn add_all<I>(&self, kmers: I, delta: u64) -> Result<u64, TableError>
    where
        I: IntoIterator<Item = Kmer>,
    {
        let mut counted = 0;
        let mut slots = self.slots.read();

        for kmer in kmers {
            let key = kmer.bits();
            loop {
                match slots.find_or_claim(key, self.max_reprobe) {
                    Slot::Found { index, claimed } => {
                        slots.add(index, key, delta, self.counter_mask, &self.overflow);
                        counted += 1;
                        if claimed
                            && slots.over_loaded(self.max_load)
                            && self.may_grow_from(slots.capacity())
                        {
                            let observed = slots.capacity();
                            RwLockReadGuard::unlocked(&mut slots, || {
                                self.grow(observed, GrowReason::Load)
                            })?;
                        }
                        break;
                    }
                    Slot::Exhausted => {
                        let observed = slots.capacity();
                        RwLockReadGuard::unlocked(&mut slots, || {
                            self.grow(observed, GrowReason::Reprobe)
                        })?;
                    }
                }
            }
        }
        Ok(counted)
    }

    fn may_grow_from(&self, capacity: usize) -> bool {
        match (self.max_capacity, capacity.checked_mul(2)) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(max), Some(next)) => next <= max,
        }
    }

    /// Doubles the table until every key fits, unless another worker already
    /// grew it past `observed`.
    fn grow(&self, observed: usize, reason: GrowReason) -> Result<(), TableError> {
        let mut slots = self.slots.write();
        if slots.capacity() != observed {
            return Ok(());
        }

        let mut capacity = observed;
        loop {
            if !self.may_grow_from(capacity) {
                return match reason {
                    GrowReason::Load => Ok(()),
                    GrowReason::Reprobe => Err(TableError::CapacityExceeded {
                        capacity,
                        max_capacity: self.max_capacity.unwrap_or(capacity),
                    }),
                };
            }
            capacity *= 2;

            if let Some((grown, demoted)) =
                slots.rehash(capacity, self.counter_mask, self.max_reprobe, &self.overflow)
            {
                for key in demoted {
                    self.overflow.remove(&key);
                }
                debug!(
                    from = observed,
                    to = capacity,
                    occupied = grown.occupied.load(Ordering::Relaxed),
                    reprobe = matches!(reason, GrowReason::Reprobe),
                    "Resized counting table"
                );
                *slots = grown;
                self.resizes.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
        }
    }

    /// Current number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.read().capacity()
    }

    /// Number of distinct keys inserted so far.
    pub fn len(&self) -> usize {
        self.slots.read().occupied.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ends the write phase. No increments are possible afterwards.
    pub fn mark_done(self) -> FrozenTable {
        let slots = self.slots.into_inner();
        let len = slots.occupied.into_inner();
        let keys: Box<[u64]> = slots
            .keys
            .into_vec()
            .into_iter()
            .map(AtomicU64::into_inner)
            .collect();
        let states: Box<[u64]> = slots
            .states
            .into_vec()
            .into_iter()
            .map(AtomicU64::into_inner)
            .collect();

        FrozenTable {
            keys,
            states,
            overflow: self.overflow.into_iter().collect(),
            counter_mask: self.counter_mask,
            max_reprobe: self.max_reprobe,
            len,
            resizes: self.resizes.into_inner(),
        }
    }
}

impl std::fmt::Debug for CountingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountingTable")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("overflowed", &self.overflow.len())
            .finish_non_exhaustive()
    }
}

/// A finished, read-only counting table.
///
/// Lookups take no locks and may run from any number of threads.
#[derive(Debug, Clone)]
pub struct FrozenTable {
    keys: Box<[u64]>,
    states: Box<[u64]>,
    overflow: FxHashMap<u64, u64>,
    counter_mask: u64,
    max_reprobe: usize,
    len: usize,
    resizes: usize,
}

impl FrozenTable {
    /// The full count of `kmer`, or `None` if it was never inserted.
    pub fn lookup(&self, kmer: Kmer) -> Option<u64> {
        let key = kmer.bits();

        for index in slot_walk(hash(key), self.max_reprobe, self.capacity()) {
            let state = self.states[index];
            if state & OCCUPIED == 0 {
                // Keys are never removed, so an empty slot ends the chain.
                return None;
            }
            if self.keys[index] == key {
                return Some(self.count_of(key, state));
            }
        }
        None
    }

    /// The full count of `kmer`, treating absent keys as zero.
    pub fn get(&self, kmer: Kmer) -> u64 {
        self.lookup(kmer).unwrap_or(0)
    }

    fn count_of(&self, key: u64, state: u64) -> u64 {
        if state & OVERFLOWED != 0 {
            self.overflow.get(&key).copied().unwrap_or(0)
        } else {
            state & self.counter_mask
        }
    }

    /// Every `(key, count)` pair, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Kmer, u64)> + '_ {
        self.keys
            .iter()
            .zip(self.states.iter())
            .filter(|&(_, &state)| state & OCCUPIED != 0)
            .map(|(&key, &state)| (Kmer::from_bits(key), self.count_of(key, state)))
    }

    /// Distinct key count, maximum count and total count in one scan.
    pub fn stats(&self) -> TableStats {
        TableStats::from_counts(self.iter().map(|(_, count)| count))
    }

    /// Number of distinct keys.
    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Final number of slots.
    pub fn capacity(&self) -> usize {
        self.states.len()
    }

    /// Number of keys whose counts live in the overflow map.
    pub fn overflowed(&self) -> usize {
        self.overflow.len()
    }

    /// How many times the table grew during the write phase.
    pub const fn resizes(&self) -> usize {
        self.resizes
    }
}
