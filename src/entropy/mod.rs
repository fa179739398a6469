use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

/// Randomness capability consumed when a round is closed.
///
/// The winner index is `draw() % slot_count`, computed exactly once per
/// close. Production uses [`OsBeacon`]; tests inject [`FixedEntropy`] so
/// settlement is deterministic. The weakness of any externally observable
/// beacon (a miner/leader can grind the value) is inherited by design and
/// documented rather than fixed here.
pub trait EntropySource {
    fn draw(&mut self) -> u64;
}

/// OS-entropy beacon: hashes 32 random bytes together with a draw counter
/// and truncates the digest to its first 8 little-endian bytes.
#[derive(Default)]
pub struct OsBeacon {
    draws: u64,
}

impl OsBeacon {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EntropySource for OsBeacon {
    fn draw(&mut self) -> u64 {
        let mut raw = [0u8; 32];
        OsRng.fill_bytes(&mut raw);
        let mut hasher = Sha256::new();
        hasher.update(raw);
        hasher.update(self.draws.to_le_bytes());
        let digest = hasher.finalize();
        self.draws += 1;
        u64::from_le_bytes(digest[0..8].try_into().expect("digest is 32 bytes"))
    }
}

/// Replays a fixed sequence of values; wraps around when exhausted.
pub struct FixedEntropy {
    values: Vec<u64>,
    next: usize,
}

impl FixedEntropy {
    pub fn new(values: Vec<u64>) -> Self {
        Self { values, next: 0 }
    }
}

impl EntropySource for FixedEntropy {
    fn draw(&mut self) -> u64 {
        let value = self.values[self.next % self.values.len()];
        self.next += 1;
        value
    }
}
