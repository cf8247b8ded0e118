//! Bloom filter persistence.

use std::io::Read;

use parking_lot::Mutex;
use tracing::error;

use crate::codec::BLOOM_FILTER_FILE;
use crate::error::{Result, XiphosError};
use crate::segment::bloom::IdBloomFilter;
use crate::storage::{Storage, StorageOutput};

/// Codec for the per-segment bloom filter blob.
#[derive(Debug, Default)]
pub struct BloomFilterCodec {
    mutex: Mutex<()>,
}

impl BloomFilterCodec {
    /// Create a new codec instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the segment's bloom filter, or an empty filter when none has
    /// been persisted yet.
    pub fn read(&self, storage: &dyn Storage) -> Result<IdBloomFilter> {
        let _guard = self.mutex.lock();

        let mut input = match storage.open_input(BLOOM_FILTER_FILE) {
            Ok(input) => input,
            Err(XiphosError::NotFound(_)) => return Ok(IdBloomFilter::new(0)),
            Err(e) => {
                error!(file = BLOOM_FILTER_FILE, error = %e, "failed to open bloom filter");
                return Err(e);
            }
        };

        let mut buf = Vec::new();
        input.read_to_end(&mut buf)?;
        IdBloomFilter::from_bytes(&buf)
    }

    /// Persist a bloom filter, replacing any existing one.
    pub fn write(&self, storage: &dyn Storage, filter: &IdBloomFilter) -> Result<()> {
        let _guard = self.mutex.lock();

        let mut output = storage.create_output(BLOOM_FILTER_FILE).inspect_err(|e| {
            error!(file = BLOOM_FILTER_FILE, error = %e, "failed to create bloom filter");
        })?;
        filter.write_to(&mut output)?;
        output.close()
    }
}
