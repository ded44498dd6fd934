use std::collections::VecDeque;
use std::fmt::Debug;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::domain::Address;

/// Inputs mixed into one index draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSeed<'a> {
    pub caller: &'a Address,
    /// Monotonic draw counter kept by the store
    pub nonce: u64,
    /// Per-call entropy supplied by the ledger
    pub entropy: [u8; 32],
}

/// Source of oracle indexes.
///
/// Draws need not be distinct: an oracle may be assigned the same index
/// more than once.
pub trait IndexSource: Send + Sync + Debug {
    /// Draw an index in `0..range`.
    fn draw(&self, seed: &IndexSeed<'_>, range: u8) -> u8;
}

/// Deterministic draw from a SHA-256 digest of the seed.
#[derive(Debug, Default, Clone, Copy)]
pub struct HashIndexSource;

impl IndexSource for HashIndexSource {
    fn draw(&self, seed: &IndexSeed<'_>, range: u8) -> u8 {
        if range == 0 {
            return 0;
        }

        let mut hasher = Sha256::new();
        hasher.update(seed.caller.as_str().as_bytes());
        hasher.update(seed.nonce.to_be_bytes());
        hasher.update(seed.entropy);
        let digest = hasher.finalize();

        digest[digest.len() - 1] % range
    }
}

/// Replays a fixed sequence of indexes, then falls back to hashing.
///
/// Used by tests and benches that need to know which oracles will be
/// asked about a flight.
#[derive(Debug, Default)]
pub struct ScriptedIndexSource {
    queue: Mutex<VecDeque<u8>>,
}

impl ScriptedIndexSource {
    pub fn new(indexes: impl IntoIterator<Item = u8>) -> Self {
        ScriptedIndexSource {
            queue: Mutex::new(indexes.into_iter().collect()),
        }
    }

    /// Append more indexes to replay.
    pub fn push(&self, indexes: impl IntoIterator<Item = u8>) {
        self.queue.lock().extend(indexes);
    }

    pub fn remaining(&self) -> usize {
        self.queue.lock().len()
    }
}

impl IndexSource for ScriptedIndexSource {
    fn draw(&self, seed: &IndexSeed<'_>, range: u8) -> u8 {
        match self.queue.lock().pop_front() {
            Some(index) if range > 0 => index % range,
            Some(index) => index,
            None => HashIndexSource.draw(seed, range),
        }
    }
}
