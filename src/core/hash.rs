/*!
 * Weak (rolling) and strong hash primitives for the delta engine.
 */

use crate::config::HashAlgorithm;
use crate::error::Result;

/// Modulus for the weak rolling checksum. Note this is a 16-bit split
/// checksum (`M = 2^16`), distinct from the real Adler-32 modulus (65521) —
/// the project fixes this value project-wide per the rolling-hash contract.
const WEAK_HASH_MODULUS: u32 = 1 << 16;

/// A rolling weak checksum over a byte window of fixed length.
///
/// `a` is the sum of bytes in the window mod `M`; `b` is the position-weighted
/// sum mod `M`. The combined weak hash is `a | (b << 16)`.
#[derive(Debug, Clone, Copy)]
pub struct RollingChecksum {
    a: u32,
    b: u32,
    window_len: usize,
}

impl RollingChecksum {
    /// Compute a fresh checksum over `window` from scratch.
    pub fn new(window: &[u8]) -> Self {
        let mut checksum = Self {
            a: 0,
            b: 0,
            window_len: window.len(),
        };
        checksum.reset(window);
        checksum
    }

    /// Recompute `a` and `b` from scratch over `window`.
    pub fn reset(&mut self, window: &[u8]) {
        let len = window.len();
        let mut a: u32 = 0;
        let mut b: u32 = 0;
        for (i, &byte) in window.iter().enumerate() {
            a = (a + byte as u32) % WEAK_HASH_MODULUS;
            // weight is (len - i), matching b(k,l) = sum (l - i) * bytes[i]
            let weight = (len - i) as u32;
            b = (b + weight * byte as u32) % WEAK_HASH_MODULUS;
        }
        self.a = a;
        self.b = b;
        self.window_len = len;
    }

    /// Roll the window forward by one byte: `old_byte` leaves at the front,
    /// `new_byte` enters at the back. The window length is unchanged.
    pub fn roll(&mut self, old_byte: u8, new_byte: u8) {
        let len = self.window_len as u32;
        let old = old_byte as u32;
        let new = new_byte as u32;

        // a' = (a - old + new) mod M
        let a_prime = (self.a + WEAK_HASH_MODULUS - old % WEAK_HASH_MODULUS + new) % WEAK_HASH_MODULUS;

        // b' = (b - len*old + a') mod M
        let weighted_old = (len * old) % WEAK_HASH_MODULUS;
        let b_prime = (self.b + WEAK_HASH_MODULUS - weighted_old + a_prime) % WEAK_HASH_MODULUS;

        self.a = a_prime;
        self.b = b_prime;
    }

    /// The combined 32-bit weak hash, `a | (b << 16)`.
    pub fn value(&self) -> u32 {
        self.a | (self.b << 16)
    }
}

/// Compute the weak hash of a byte slice in one shot (no rolling state kept).
pub fn weak_hash(bytes: &[u8]) -> u32 {
    RollingChecksum::new(bytes).value()
}

/// Compute the strong hash of a byte slice using the configured algorithm.
pub fn strong_hash(bytes: &[u8], algorithm: HashAlgorithm) -> Result<Vec<u8>> {
    match algorithm {
        HashAlgorithm::Blake3 => Ok(blake3::hash(bytes).as_bytes().to_vec()),
        HashAlgorithm::Sha256 => {
            use sha2::{Digest, Sha256};
            let mut hasher = Sha256::new();
            hasher.update(bytes);
            Ok(hasher.finalize().to_vec())
        }
    }
}

/// Byte width of the strong hash digest produced by `algorithm`, needed by
/// the wire codec to read a fixed-width record.
pub fn strong_hash_len(algorithm: HashAlgorithm) -> usize {
    match algorithm {
        HashAlgorithm::Blake3 => 32,
        HashAlgorithm::Sha256 => 32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weak_hash_matches_fresh_recompute_across_roll() {
        let data = b"abcdefghijklmnop";
        let window_len = 4;

        let mut rolling = RollingChecksum::new(&data[0..window_len]);

        for start in 1..=(data.len() - window_len) {
            rolling.roll(data[start - 1], data[start + window_len - 1]);
            let fresh = RollingChecksum::new(&data[start..start + window_len]);
            assert_eq!(
                rolling.value(),
                fresh.value(),
                "mismatch at window start {}",
                start
            );
        }
    }

    #[test]
    fn test_weak_hash_independent_of_alignment() {
        // Same byte content at different offsets in a larger buffer
        // produces the same weak hash.
        let window = b"test";
        let h1 = weak_hash(window);
        let h2 = weak_hash(window);
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_strong_hash_deterministic() {
        let data = b"hello world";
        let h1 = strong_hash(data, HashAlgorithm::Blake3).unwrap();
        let h2 = strong_hash(data, HashAlgorithm::Blake3).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), strong_hash_len(HashAlgorithm::Blake3));
    }

    #[test]
    fn test_strong_hash_distinguishes_weak_collisions() {
        // Two different 4-byte blocks that happen to share a weak hash
        // must still differ in strong hash (scenario S6).
        let block_a = b"abcd";
        let block_b = b"badc"; // same bytes, different order -> same sum 'a', different weighting 'b'
        let strong_a = strong_hash(block_a, HashAlgorithm::Blake3).unwrap();
        let strong_b = strong_hash(block_b, HashAlgorithm::Blake3).unwrap();
        assert_ne!(strong_a, strong_b);
    }
}
