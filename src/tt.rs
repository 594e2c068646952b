//! Shared transposition table.
//!
//! 32-byte clusters of three 10-byte entries. Clusters are addressed by
//! the 128-bit multiply-high of the hash and the cluster count, which
//! spreads keys uniformly without a modulus. The table is shared
//! across workers without locks: entries are small enough that a racy
//! read at worst pairs a key with a stale value, which the search
//! tolerates (the move is re-validated before use).

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::board::Move;
use crate::util::AlignedBuf;

/// Bound kind stored with a score.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Bound {
    None = 0,
    /// Score is a lower bound (fail high).
    Lower = 1,
    /// Score is an upper bound (fail low).
    Upper = 2,
    Exact = 3,
}

impl Bound {
    #[inline]
    #[must_use]
    pub fn from_bits(bits: u8) -> Bound {
        match bits & 0b11 {
            1 => Bound::Lower,
            2 => Bound::Upper,
            3 => Bound::Exact,
            _ => Bound::None,
        }
    }

    /// Does this bound allow a cutoff against the given comparison
    /// direction? `lower` asks for Lower/Exact, otherwise Upper/Exact.
    #[inline]
    #[must_use]
    pub fn permits(self, lower: bool) -> bool {
        let mask = if lower { 1 } else { 2 };
        (self as u8) & mask != 0
    }
}

const AGE_INC: u8 = 0x8;
const AGE_MASK: u8 = 0xF8;
const PV_MASK: u8 = 0x4;
const BOUND_MASK: u8 = 0x3;
const AGE_CYCLE: u16 = 255 + AGE_INC as u16;

/// Stored depths are offset so the u8 can also encode "no depth".
const DEPTH_OFFSET: i32 = -7;
pub const DEPTH_NONE: i32 = -6;

#[derive(Clone, Copy, Default)]
#[repr(C)]
pub struct TTEntry {
    key: u16,
    mv: u16,
    score: i16,
    static_eval: i16,
    age_pv_bound: u8,
    depth: u8,
}

impl TTEntry {
    #[inline]
    #[must_use]
    pub fn score(self) -> i16 {
        self.score
    }

    #[inline]
    #[must_use]
    pub fn static_eval(self) -> i16 {
        self.static_eval
    }

    #[inline]
    #[must_use]
    pub fn best_move(self) -> Move {
        Move::from_raw(self.mv)
    }

    #[inline]
    #[must_use]
    pub fn bound(self) -> Bound {
        Bound::from_bits(self.age_pv_bound & BOUND_MASK)
    }

    #[inline]
    #[must_use]
    pub fn is_pv(self) -> bool {
        self.age_pv_bound & PV_MASK != 0
    }

    #[inline]
    #[must_use]
    pub fn depth(self) -> i32 {
        i32::from(self.depth) + DEPTH_OFFSET
    }

    #[inline]
    fn raw_depth(self) -> i32 {
        i32::from(self.depth)
    }

    #[inline]
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.depth == 0
    }

    /// Cyclic distance from `age` back to this entry's age.
    #[inline]
    fn relative_age(self, age: u8) -> i32 {
        i32::from((AGE_CYCLE + u16::from(age) - u16::from(self.age_pv_bound)) as u8 & AGE_MASK)
    }

    /// Replacement quality: deep and recent beats shallow and stale.
    #[inline]
    fn quality(self, age: u8) -> i32 {
        self.raw_depth() - self.relative_age(age)
    }
}

#[repr(C, align(32))]
#[derive(Clone, Copy, Default)]
struct Cluster {
    entries: [TTEntry; 3],
    _pad: [u8; 2],
}

/// A writable slot handle returned by probe. Points into the shared
/// table; only valid until the owning search finishes.
pub struct TTSlot {
    ptr: *mut TTEntry,
}

impl TTSlot {
    #[inline]
    #[must_use]
    pub fn read(&self) -> TTEntry {
        unsafe { *self.ptr }
    }

    /// Write through with the standard preservation rules: keep the
    /// old move unless a new one (or a different key) arrives; keep
    /// the old data unless the bound is exact, the key changed, or the
    /// new depth is close enough to matter.
    pub fn update(
        &self,
        hash: u64,
        score: i16,
        bound: Bound,
        depth: i32,
        mv: Move,
        static_eval: i16,
        age: u8,
        is_pv: bool,
    ) {
        let key = hash as u16;
        let entry = unsafe { &mut *self.ptr };

        if !mv.is_null() || key != entry.key {
            entry.mv = mv.raw();
        }

        if bound == Bound::Exact
            || key != entry.key
            || depth + i32::from(is_pv) * 2 > entry.raw_depth() - 4 + DEPTH_OFFSET
        {
            entry.key = key;
            entry.score = score;
            entry.static_eval = static_eval;
            entry.depth = (depth - DEPTH_OFFSET) as u8;
            entry.age_pv_bound = age | (u8::from(is_pv) << 2) | bound as u8;
        }
    }
}

pub struct TranspositionTable {
    clusters: AlignedBuf<UnsafeCell<Cluster>>,
    cluster_count: u64,
    age: AtomicU8,
}

// Entries race benignly; see the module docs.
unsafe impl Sync for TranspositionTable {}

impl TranspositionTable {
    /// Allocate with approximately `mb` megabytes of clusters.
    #[must_use]
    pub fn new(mb: usize) -> Self {
        let cluster_count = (mb.max(1) * 1024 * 1024 / std::mem::size_of::<Cluster>()).max(1);
        TranspositionTable {
            clusters: AlignedBuf::new_zeroed(cluster_count),
            cluster_count: cluster_count as u64,
            age: AtomicU8::new(0),
        }
    }

    /// Resize, dropping all stored entries.
    pub fn resize(&mut self, mb: usize) {
        *self = TranspositionTable::new(mb);
    }

    /// Zero every cluster. Callers must ensure no search is probing
    /// concurrently.
    pub fn clear(&self) {
        for cluster in self.clusters.as_slice() {
            unsafe {
                *cluster.get() = Cluster::default();
            }
        }
        self.age.store(0, Ordering::Relaxed);
    }

    #[inline]
    #[must_use]
    pub fn age(&self) -> u8 {
        self.age.load(Ordering::Relaxed)
    }

    /// Advance the generation; called once per root search.
    pub fn new_search(&self) {
        self.age.fetch_add(AGE_INC, Ordering::Relaxed);
    }

    #[inline]
    fn cluster_index(&self, hash: u64) -> usize {
        ((u128::from(hash) * u128::from(self.cluster_count)) >> 64) as usize
    }

    /// Prefetch the cluster for `hash` into L1.
    #[inline]
    pub fn prefetch(&self, hash: u64) {
        #[cfg(target_arch = "x86_64")]
        unsafe {
            let ptr = self.clusters.as_slice()[self.cluster_index(hash)].get();
            std::arch::x86_64::_mm_prefetch::<{ std::arch::x86_64::_MM_HINT_T0 }>(ptr.cast());
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            let _ = hash;
        }
    }

    /// Probe for `hash`. Returns whether the slot holds this position
    /// and a handle for the entry to read or overwrite: the matching
    /// entry, the first empty one, or the lowest-quality victim.
    pub fn probe(&self, hash: u64) -> (bool, TTSlot) {
        let cluster = self.clusters.as_slice()[self.cluster_index(hash)].get();
        let entries = unsafe { &mut (*cluster).entries };
        let key = hash as u16;

        for i in 0..entries.len() {
            if entries[i].key == key || entries[i].is_empty() {
                let hit = !entries[i].is_empty();
                return (
                    hit,
                    TTSlot {
                        ptr: &mut entries[i],
                    },
                );
            }
        }

        let age = self.age();
        let mut victim = 0;
        for i in 1..entries.len() {
            if entries[i].quality(age) < entries[victim].quality(age) {
                victim = i;
            }
        }
        (
            false,
            TTSlot {
                ptr: &mut entries[victim],
            },
        )
    }

    /// Fraction of sampled entries written during the current
    /// generation, in permille.
    #[must_use]
    pub fn hashfull(&self) -> u32 {
        let age = self.age();
        let sample = (self.cluster_count as usize).min(1000);
        let mut filled = 0;
        for cluster in &self.clusters.as_slice()[..sample] {
            let entries = unsafe { &(*cluster.get()).entries };
            for e in entries {
                if !e.is_empty() && e.age_pv_bound & AGE_MASK == age & AGE_MASK {
                    filled += 1;
                }
            }
        }
        (filled * 1000 / (sample as u32 * 3)) as u32
    }
}
