//! Membership filter over record identifiers.
//!
//! Used to short-circuit identifier lookups against a segment without
//! touching the uid files. Identifiers are mixed through a 64-bit finalizer
//! and probed with enhanced double hashing.
//!
//! Binary layout (little-endian):
//! ```text
//! [num_bits: u64]              // 8 bytes
//! [num_hashes: u32]            // 4 bytes
//! [padding: u32 = 0]           // 4 bytes
//! [bits: u64 x word_count]     // word_count = ceil(num_bits / 64)
//! ```

use std::io::Write;

use crate::error::{Result, XiphosError};
use crate::segment::types::DocId;

/// Bits reserved per expected key.
const BITS_PER_KEY: usize = 10;

/// Probes per query.
const NUM_HASHES: usize = 7;

/// Header size: num_bits(8) + num_hashes(4) + padding(4).
const HEADER_SIZE: usize = 16;

/// splitmix64 finalizer, spreads raw identifiers into well-mixed 64-bit
/// values before probing.
fn mix64(mut x: u64) -> u64 {
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d049bb133111eb);
    x ^ (x >> 31)
}

/// Probe positions via enhanced double hashing. The step hash is forced odd
/// so it stays coprime with power-of-two bit counts.
fn probe_positions(uid: DocId, num_hashes: usize, num_bits: usize) -> impl Iterator<Item = usize> {
    let h1 = mix64(uid);
    let h2 = mix64(uid.wrapping_mul(0x9e3779b97f4a7c15).rotate_left(31)) | 1;
    (0..num_hashes as u64)
        .map(move |i| (h1.wrapping_add(i.wrapping_mul(h2)) % (num_bits as u64)) as usize)
}

/// Bloom filter over record identifiers, backed by a word-aligned bit vector.
#[derive(Debug, Clone)]
pub struct IdBloomFilter {
    bits: Vec<u64>,
    num_bits: usize,
    num_hashes: usize,
}

impl IdBloomFilter {
    /// Create a filter sized for `num_keys` expected insertions.
    ///
    /// The bit count is rounded up to a multiple of 64 with a minimum of 64
    /// bits. A filter built for 0 keys is valid and reports every query as
    /// absent until something is inserted.
    pub fn new(num_keys: usize) -> Self {
        let raw_bits = num_keys.saturating_mul(BITS_PER_KEY);
        let num_bits = (raw_bits.max(64) + 63) & !63;
        IdBloomFilter {
            bits: vec![0u64; num_bits / 64],
            num_bits,
            num_hashes: NUM_HASHES,
        }
    }

    /// Insert a record identifier.
    pub fn insert(&mut self, uid: DocId) {
        for pos in probe_positions(uid, self.num_hashes, self.num_bits) {
            self.bits[pos / 64] |= 1u64 << (pos % 64);
        }
    }

    /// Test whether an identifier might be present.
    ///
    /// `false` means definitely absent; `true` means probably present.
    pub fn maybe_contains(&self, uid: DocId) -> bool {
        probe_positions(uid, self.num_hashes, self.num_bits)
            .all(|pos| self.bits[pos / 64] & (1u64 << (pos % 64)) != 0)
    }

    /// Number of bits in the filter.
    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    /// Number of probes per query.
    pub fn num_hashes(&self) -> usize {
        self.num_hashes
    }

    /// Total serialized size in bytes.
    pub fn serialized_size(&self) -> usize {
        HEADER_SIZE + self.bits.len() * 8
    }

    /// Serialize the filter into a writer.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&(self.num_bits as u64).to_le_bytes())?;
        writer.write_all(&(self.num_hashes as u32).to_le_bytes())?;
        writer.write_all(&0u32.to_le_bytes())?;
        for &word in &self.bits {
            writer.write_all(&word.to_le_bytes())?;
        }
        Ok(())
    }

    /// Deserialize a filter from its persisted bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(XiphosError::storage(
                "bloom filter blob shorter than its header",
            ));
        }

        let num_bits = u64::from_le_bytes(bytes[0..8].try_into().unwrap()) as usize;
        let num_hashes = u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as usize;

        if num_bits == 0 || num_bits % 64 != 0 {
            return Err(XiphosError::storage(format!(
                "bloom filter bit count {num_bits} is not a positive multiple of 64"
            )));
        }

        let word_count = num_bits / 64;
        let expected = HEADER_SIZE + word_count * 8;
        if bytes.len() < expected {
            return Err(XiphosError::storage(format!(
                "bloom filter blob truncated: expected {expected} bytes, got {}",
                bytes.len()
            )));
        }

        let mut bits = Vec::with_capacity(word_count);
        for i in 0..word_count {
            let offset = HEADER_SIZE + i * 8;
            bits.push(u64::from_le_bytes(
                bytes[offset..offset + 8].try_into().unwrap(),
            ));
        }

        Ok(IdBloomFilter {
            bits,
            num_bits,
            num_hashes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_contains_nothing() {
        let filter = IdBloomFilter::new(0);
        assert_eq!(filter.num_bits(), 64);
        for uid in 0..100 {
            assert!(!filter.maybe_contains(uid));
        }
    }

    #[test]
    fn test_no_false_negatives() {
        let n = 1000;
        let mut filter = IdBloomFilter::new(n);
        for uid in 0..n as u64 {
            filter.insert(uid);
        }
        for uid in 0..n as u64 {
            assert!(filter.maybe_contains(uid), "false negative for uid {uid}");
        }
    }

    #[test]
    fn test_roundtrip() {
        let mut filter = IdBloomFilter::new(500);
        for uid in (0..500u64).map(|i| i * 31 + 7) {
            filter.insert(uid);
        }

        let mut buf = Vec::new();
        filter.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), filter.serialized_size());

        let restored = IdBloomFilter::from_bytes(&buf).unwrap();
        assert_eq!(restored.num_bits(), filter.num_bits());
        assert_eq!(restored.num_hashes(), filter.num_hashes());
        for uid in (0..500u64).map(|i| i * 31 + 7) {
            assert!(restored.maybe_contains(uid));
        }
    }

    #[test]
    fn test_from_bytes_rejects_short_blob() {
        let err = IdBloomFilter::from_bytes(&[0u8; 12]).unwrap_err();
        assert!(err.to_string().contains("shorter than its header"));
    }

    #[test]
    fn test_from_bytes_rejects_truncated_bits() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&128u64.to_le_bytes());
        buf.extend_from_slice(&7u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&0u64.to_le_bytes()); // one word of two

        let err = IdBloomFilter::from_bytes(&buf).unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn test_false_positive_rate_stays_low() {
        let n = 10_000;
        let mut filter = IdBloomFilter::new(n);
        for uid in 0..n as u64 {
            filter.insert(uid);
        }

        let probes = 100_000u64;
        let mut false_positives = 0u64;
        for uid in (n as u64)..(n as u64 + probes) {
            if filter.maybe_contains(uid) {
                false_positives += 1;
            }
        }

        let fpr = false_positives as f64 / probes as f64;
        assert!(fpr < 0.02, "false positive rate too high: {fpr:.4}");
    }
}
