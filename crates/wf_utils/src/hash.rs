//! Hash containers built on *hashbrown*, seeded through *foldhash*.
//!
//! [`FixedHashState`] yields the same hash for the same input in every run,
//! which keeps iteration order reproducible across processes. [`NoOpHashState`]
//! forwards an already well distributed `u64`, such as the one a
//! [`TypeId`](core::any::TypeId) writes.

use core::hash::{BuildHasher, Hasher};

use foldhash::fast::{FixedState, FoldHasher};

// -----------------------------------------------------------------------------
// Re-export crates

pub use foldhash;
pub use hashbrown;

// -----------------------------------------------------------------------------
// FixedHashState

const SEED: FixedState = FixedState::with_seed(0x5EED_F00D_1A7E_C0DE);

/// The hasher produced by [`FixedHashState`].
pub type FixedHasher = FoldHasher<'static>;

/// A `BuildHasher` with a constant seed.
///
/// # Examples
///
/// ```
/// use core::hash::BuildHasher;
/// use wf_utils::hash::FixedHashState;
///
/// assert_eq!(FixedHashState.hash_one("weft"), FixedHashState.hash_one("weft"));
/// ```
#[derive(Copy, Clone, Default, Debug)]
pub struct FixedHashState;

impl BuildHasher for FixedHashState {
    type Hasher = FixedHasher;

    #[inline(always)]
    fn build_hasher(&self) -> Self::Hasher {
        SEED.build_hasher()
    }
}

// -----------------------------------------------------------------------------
// NoOpHashState

/// Hasher that stores the last written `u64` as the hash.
#[derive(Copy, Clone, Default, Debug)]
pub struct NoOpHasher {
    hash: u64,
}

impl Hasher for NoOpHasher {
    #[inline]
    fn finish(&self) -> u64 {
        self.hash
    }

    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes.iter().rev() {
            self.hash = self.hash.rotate_left(8).wrapping_add(*byte as u64);
        }
    }

    #[inline]
    fn write_u64(&mut self, i: u64) {
        self.hash = i;
    }
}

/// `BuildHasher` for keys that are hashes already.
#[derive(Copy, Clone, Default, Debug)]
pub struct NoOpHashState;

impl BuildHasher for NoOpHashState {
    type Hasher = NoOpHasher;

    #[inline(always)]
    fn build_hasher(&self) -> Self::Hasher {
        NoOpHasher { hash: 0 }
    }
}

// -----------------------------------------------------------------------------
// Containers

/// A [`hashbrown::HashMap`] defaulting to [`FixedHashState`].
pub type HashMap<K, V, S = FixedHashState> = hashbrown::HashMap<K, V, S>;

/// A [`hashbrown::HashSet`] defaulting to [`FixedHashState`].
pub type HashSet<T, S = FixedHashState> = hashbrown::HashSet<T, S>;
