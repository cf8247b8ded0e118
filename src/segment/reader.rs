//! Segment reader: loading persisted artifacts.

use std::sync::Arc;

use crate::codec::manifest::SegmentManifest;
use crate::codec::{AttributesCodec, BloomFilterCodec, DeletedDocsCodec, VectorsCodec};
use crate::error::Result;
use crate::index::{load_index, VectorIndex};
use crate::segment::bloom::IdBloomFilter;
use crate::segment::types::{AttributeBlock, DeletedDocs, DocId, Vectors};
use crate::storage::Storage;

/// Reader bound to one segment directory.
///
/// A reader opened on an existing directory is immediately loadable; it does
/// not pass through the writer's staging states and never mutates the
/// directory.
#[derive(Debug)]
pub struct SegmentReader {
    storage: Arc<dyn Storage>,
    deleted_docs_codec: DeletedDocsCodec,
    vectors_codec: VectorsCodec,
    attributes_codec: AttributesCodec,
    bloom_codec: BloomFilterCodec,
}

impl SegmentReader {
    /// Create a reader over a segment directory.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        SegmentReader {
            storage,
            deleted_docs_codec: DeletedDocsCodec::new(),
            vectors_codec: VectorsCodec::new(),
            attributes_codec: AttributesCodec::new(),
            bloom_codec: BloomFilterCodec::new(),
        }
    }

    /// The storage handle this reader is bound to.
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Load the segment's vector block.
    pub fn load_vectors(&self) -> Result<Vectors> {
        self.vectors_codec.read(&*self.storage)
    }

    /// Load only the vector identifiers.
    pub fn load_uids(&self) -> Result<Vec<DocId>> {
        self.vectors_codec.read_uids(&*self.storage)
    }

    /// Load a byte range of the raw vector payload. The length is clamped to
    /// the stored extent; an offset beyond it is a typed error.
    pub fn load_vectors_range(&self, offset: u64, num_bytes: u64) -> Result<Vec<u8>> {
        self.vectors_codec
            .read_range(&*self.storage, offset, num_bytes)
    }

    /// Load all attribute rows of the segment.
    pub fn load_attributes(&self) -> Result<AttributeBlock> {
        self.attributes_codec.read(&*self.storage)
    }

    /// Load the deletion log. The log must have been initialized by at least
    /// one prior write, even an empty one.
    pub fn load_deleted_docs(&self) -> Result<DeletedDocs> {
        self.deleted_docs_codec.read(&*self.storage)
    }

    /// Number of logged deletions, read without the log body.
    pub fn read_deleted_docs_size(&self) -> Result<usize> {
        self.deleted_docs_codec.read_size(&*self.storage)
    }

    /// Load the segment's bloom filter, or an empty filter when none was
    /// persisted.
    pub fn load_bloom_filter(&self) -> Result<IdBloomFilter> {
        self.bloom_codec.read(&*self.storage)
    }

    /// Load the segment manifest.
    pub fn load_manifest(&self) -> Result<SegmentManifest> {
        SegmentManifest::load(&*self.storage)
    }

    /// Load a similarity index blob from `location`. The location storage
    /// may be rooted somewhere other than this segment's directory.
    pub fn load_vector_index(
        &self,
        storage: &dyn Storage,
        location: &str,
    ) -> Result<Box<dyn VectorIndex>> {
        load_index(storage, location)
    }
}
