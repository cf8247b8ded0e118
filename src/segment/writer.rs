//! Segment writer: staging and serialization.

use std::sync::Arc;

use ahash::AHashMap;
use tracing::debug;

use crate::codec::manifest::{BlockKind, ManifestEntry, SegmentManifest};
use crate::codec::{
    AttributesCodec, BloomFilterCodec, DeletedDocsCodec, VectorsCodec, ATTR_UID_EXT,
    BLOOM_FILTER_FILE, RAW_ATTR_EXT, RAW_VECTOR_EXT, VECTOR_UID_EXT,
};
use crate::error::{Result, XiphosError};
use crate::index::VectorIndex;
use crate::segment::bloom::IdBloomFilter;
use crate::segment::types::{AttributeBlock, DeletedDocs, DocId, Vectors};
use crate::storage::Storage;

/// Writer bound to one segment directory.
///
/// A fresh writer is empty; `add_*` calls stage state in memory without any
/// I/O, and [`SegmentWriter::serialize`] flushes the staged artifacts through
/// the codecs. Deletion-log writes go straight to storage since the log is
/// additive by design. The writer does not own the persisted files; dropping
/// it discards only the in-memory staging state.
#[derive(Debug)]
pub struct SegmentWriter {
    storage: Arc<dyn Storage>,
    vectors: Option<Vectors>,
    attributes: Option<AttributeBlock>,
    bloom_filter: Option<IdBloomFilter>,
    vector_index: Option<Box<dyn VectorIndex>>,
    deleted_docs_codec: DeletedDocsCodec,
    vectors_codec: VectorsCodec,
    attributes_codec: AttributesCodec,
    bloom_codec: BloomFilterCodec,
}

impl SegmentWriter {
    /// Create a writer over a segment directory, materializing the directory
    /// if the backend has real ones.
    pub fn new(storage: Arc<dyn Storage>) -> Result<Self> {
        storage.create_directory()?;

        Ok(SegmentWriter {
            storage,
            vectors: None,
            attributes: None,
            bloom_filter: None,
            vector_index: None,
            deleted_docs_codec: DeletedDocsCodec::new(),
            vectors_codec: VectorsCodec::new(),
            attributes_codec: AttributesCodec::new(),
            bloom_codec: BloomFilterCodec::new(),
        })
    }

    /// The storage handle this writer is bound to.
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Stage raw vectors and their identifiers under a block name.
    ///
    /// A segment holds one vector block: repeated calls with the same name
    /// append to it, a different name is rejected.
    pub fn add_vectors(&mut self, name: &str, data: &[u8], uids: &[DocId]) -> Result<()> {
        match &mut self.vectors {
            Some(vectors) if vectors.name() == name => {
                vectors.append(data, uids);
            }
            Some(vectors) => {
                return Err(XiphosError::invalid_operation(format!(
                    "segment already stages vector block '{}', cannot add '{name}'",
                    vectors.name()
                )));
            }
            None => {
                let mut vectors = Vectors::new(name);
                vectors.append(data, uids);
                self.vectors = Some(vectors);
            }
        }
        Ok(())
    }

    /// Stage attribute rows. Shape rules are enforced here, before any I/O:
    /// every attribute must carry `uids.len() * byte_width` bytes, and
    /// repeated calls must use the same attribute set and block name.
    pub fn add_attributes(
        &mut self,
        name: &str,
        byte_widths: &AHashMap<String, usize>,
        values: &AHashMap<String, Vec<u8>>,
        uids: &[DocId],
    ) -> Result<()> {
        let block = self
            .attributes
            .get_or_insert_with(|| AttributeBlock::new(name));
        if block.name() != name {
            return Err(XiphosError::invalid_operation(format!(
                "segment already stages attribute block '{}', cannot add '{name}'",
                block.name()
            )));
        }
        block.append(byte_widths, values, uids)
    }

    /// Append deletions to the segment's log. Additive: offsets already in
    /// the persisted log survive this call.
    pub fn write_deleted_docs(&self, deleted: &DeletedDocs) -> Result<()> {
        self.deleted_docs_codec.write(&*self.storage, deleted)
    }

    /// Flush the staged artifacts, in order: vector block, attribute blocks,
    /// bloom filter (an empty one if the segment has none yet), manifest.
    ///
    /// Each sub-write uses its own codec. The first failure aborts the
    /// remaining writes; files already written stay in place.
    pub fn serialize(&mut self) -> Result<()> {
        if let Some(vectors) = &self.vectors {
            self.vectors_codec.write(&*self.storage, vectors)?;
        }

        if let Some(attributes) = &self.attributes {
            self.attributes_codec.write(&*self.storage, attributes)?;
        }

        if self.bloom_filter.is_some() || !self.storage.file_exists(BLOOM_FILTER_FILE) {
            self.write_bloom_filter()?;
        }

        self.build_manifest().save(&*self.storage)?;

        debug!(
            vectors = self.vectors.as_ref().map_or(0, Vectors::byte_count),
            attributes = self.attributes.as_ref().map_or(0, |a| a.byte_widths().len()),
            "segment serialized"
        );
        Ok(())
    }

    /// Install the similarity index this writer will persist.
    pub fn set_vector_index(&mut self, index: Box<dyn VectorIndex>) {
        self.vector_index = Some(index);
    }

    /// The installed similarity index, if any.
    pub fn vector_index(&self) -> Option<&dyn VectorIndex> {
        self.vector_index.as_deref()
    }

    /// Persist the installed similarity index under `location`. The location
    /// storage may be rooted somewhere other than this segment's directory.
    pub fn write_vector_index(&self, storage: &dyn Storage, location: &str) -> Result<()> {
        let index = self
            .vector_index
            .as_ref()
            .ok_or_else(|| XiphosError::invalid_operation("no vector index set on segment"))?;
        index.serialize(storage, location)
    }

    /// Persist the staged bloom filter, creating an empty one when nothing
    /// is staged.
    pub fn write_bloom_filter(&mut self) -> Result<()> {
        let filter = self
            .bloom_filter
            .get_or_insert_with(|| IdBloomFilter::new(0));
        self.bloom_codec.write(&*self.storage, filter)
    }

    /// Populate the staged bloom filter from the staged vector identifiers.
    pub fn build_bloom_filter(&mut self) {
        let uids = self.vectors.as_ref().map_or(&[][..], Vectors::uids);
        let mut filter = IdBloomFilter::new(uids.len());
        for &uid in uids {
            filter.insert(uid);
        }
        self.bloom_filter = Some(filter);
    }

    /// Number of staged vector rows.
    pub fn row_count(&self) -> usize {
        self.vectors.as_ref().map_or(0, Vectors::uid_count)
    }

    /// Number of staged raw vector bytes.
    pub fn vector_byte_count(&self) -> usize {
        self.vectors.as_ref().map_or(0, Vectors::byte_count)
    }

    fn build_manifest(&self) -> SegmentManifest {
        let mut manifest = SegmentManifest::new();

        if let Some(vectors) = &self.vectors {
            manifest.push(ManifestEntry {
                name: vectors.name().to_string(),
                kind: BlockKind::Vectors,
                raw_file: format!("{}{}", vectors.name(), RAW_VECTOR_EXT),
                uid_file: format!("{}{}", vectors.name(), VECTOR_UID_EXT),
                byte_width: None,
            });
        }

        if let Some(attributes) = &self.attributes {
            for name in attributes.attribute_names() {
                manifest.push(ManifestEntry {
                    name: name.to_string(),
                    kind: BlockKind::Attribute,
                    raw_file: format!("{name}{RAW_ATTR_EXT}"),
                    uid_file: format!("{name}{ATTR_UID_EXT}"),
                    byte_width: Some(attributes.byte_widths()[name]),
                });
            }
        }

        manifest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    use crate::storage::{FileStorage, StorageConfig};

    fn create_writer() -> (TempDir, SegmentWriter) {
        let temp_dir = TempDir::new().unwrap();
        let storage: Arc<dyn Storage> =
            Arc::new(FileStorage::new(temp_dir.path(), StorageConfig::default()).unwrap());
        let writer = SegmentWriter::new(storage).unwrap();
        (temp_dir, writer)
    }

    #[test]
    fn test_add_vectors_appends_same_name() {
        let (_temp_dir, mut writer) = create_writer();

        writer.add_vectors("v", &[0, 1], &[10]).unwrap();
        writer.add_vectors("v", &[2, 3], &[20]).unwrap();

        assert_eq!(writer.row_count(), 2);
        assert_eq!(writer.vector_byte_count(), 4);
    }

    #[test]
    fn test_add_vectors_rejects_second_name() {
        let (_temp_dir, mut writer) = create_writer();

        writer.add_vectors("v", &[0], &[10]).unwrap();
        let err = writer.add_vectors("w", &[1], &[20]).unwrap_err();

        assert!(matches!(err, XiphosError::InvalidOperation(_)));
    }

    #[test]
    fn test_add_attributes_shape_checked_without_io() {
        let (_temp_dir, mut writer) = create_writer();

        let widths: AHashMap<String, usize> = [("age".to_string(), 4)].into_iter().collect();
        let values: AHashMap<String, Vec<u8>> = [("age".to_string(), vec![0u8; 4])].into_iter().collect();
        let err = writer
            .add_attributes("attrs", &widths, &values, &[1, 2])
            .unwrap_err();

        assert!(matches!(err, XiphosError::ShapeMismatch(_)));
        // Nothing was persisted by the failed staging call.
        assert!(writer.storage().list_files().unwrap().is_empty());
    }

    #[test]
    fn test_serialize_writes_bloom_and_manifest() {
        let (_temp_dir, mut writer) = create_writer();

        writer.add_vectors("v", &[0, 1], &[1234, 5678]).unwrap();
        writer.serialize().unwrap();

        let files = writer.storage().list_files().unwrap();
        assert_eq!(
            files,
            vec!["bloom_filter", "segment.manifest", "v.rv", "v.uid"]
        );
    }

    #[test]
    fn test_serialize_preserves_existing_bloom_filter() {
        let (_temp_dir, mut writer) = create_writer();

        writer.add_vectors("v", &[0, 1], &[7, 8]).unwrap();
        writer.build_bloom_filter();
        writer.serialize().unwrap();

        // A later serialize without a staged filter must not clobber it.
        let mut second = SegmentWriter::new(writer.storage().clone()).unwrap();
        second.add_vectors("v", &[], &[]).unwrap();
        second.serialize().unwrap();

        let codec = BloomFilterCodec::new();
        let filter = codec.read(&**writer.storage()).unwrap();
        assert!(filter.maybe_contains(7));
        assert!(filter.maybe_contains(8));
    }

    #[test]
    fn test_write_vector_index_without_index_is_rejected() {
        let (_temp_dir, writer) = create_writer();

        let err = writer
            .write_vector_index(&**writer.storage(), "seg_index")
            .unwrap_err();
        assert!(matches!(err, XiphosError::InvalidOperation(_)));
    }
}
