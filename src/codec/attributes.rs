//! Attribute block codec.
//!
//! Each attribute persists as its own file pair `{attr}.ra` / `{attr}.rid`
//! in the same length-prefixed layout as the vector block. The per-attribute
//! writes are independent; once the first file has landed, a later failure
//! surfaces as a partial write and the earlier files stay in place.

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::codec::manifest::SegmentManifest;
use crate::codec::vectors::{read_raw, read_uid_file, write_blob, write_uids};
use crate::codec::{ATTR_UID_EXT, RAW_ATTR_EXT};
use crate::error::{Result, XiphosError};
use crate::segment::types::AttributeBlock;
use crate::storage::Storage;

/// Codec for the per-segment attribute files.
#[derive(Debug, Default)]
pub struct AttributesCodec {
    mutex: Mutex<()>,
}

impl AttributesCodec {
    /// Create a new codec instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write one file pair per staged attribute, in sorted name order.
    pub fn write(&self, storage: &dyn Storage, block: &AttributeBlock) -> Result<()> {
        let _guard = self.mutex.lock();

        let mut wrote_any = false;
        for name in block.attribute_names() {
            let raw_file = format!("{name}{RAW_ATTR_EXT}");
            let uid_file = format!("{name}{ATTR_UID_EXT}");

            with_partial_context(
                write_blob(storage, &raw_file, &block.values()[name]),
                &raw_file,
                wrote_any,
            )?;
            wrote_any = true;

            with_partial_context(
                write_uids(storage, &uid_file, block.uids()),
                &uid_file,
                wrote_any,
            )?;
        }

        debug!(
            attributes = block.byte_widths().len(),
            rows = block.uids().len(),
            "attribute block written"
        );
        Ok(())
    }

    /// Read all attributes of a segment.
    ///
    /// A segment without attributes yields an empty block. Byte widths come
    /// from the manifest; on the extension-scan fallback they are derived
    /// from the row-buffer length divided by the row count.
    pub fn read(&self, storage: &dyn Storage) -> Result<AttributeBlock> {
        let _guard = self.mutex.lock();

        match SegmentManifest::load(storage) {
            Ok(manifest) => {
                let mut block = AttributeBlock::default();
                for entry in manifest.attribute_blocks() {
                    let bytes = read_raw(storage, &entry.raw_file, 0, u64::MAX)?;
                    let uids = read_uid_file(storage, &entry.uid_file)?;
                    let width = entry.byte_width.unwrap_or_else(|| {
                        if uids.is_empty() { 0 } else { bytes.len() / uids.len() }
                    });
                    block.insert_raw(entry.name.clone(), width, bytes);
                    block.set_uids(uids);
                }
                Ok(block)
            }
            Err(XiphosError::NotFound(_)) => read_by_extension(storage),
            Err(e) => Err(e),
        }
    }
}

fn with_partial_context(result: Result<()>, file: &str, wrote_any: bool) -> Result<()> {
    result.map_err(|e| {
        if wrote_any {
            error!(file = %file, error = %e, "attribute write failed after earlier files landed");
            XiphosError::partial_write(format!(
                "attribute file {file} failed after earlier attribute files were written: {e}"
            ))
        } else {
            e
        }
    })
}

fn read_by_extension(storage: &dyn Storage) -> Result<AttributeBlock> {
    let mut block = AttributeBlock::default();

    for name in storage.list_files()? {
        if let Some(stem) = name.strip_suffix(RAW_ATTR_EXT) {
            let bytes = read_raw(storage, &name, 0, u64::MAX)?;
            // Width is recovered once the uid file is seen; insert with a
            // placeholder for now.
            block.insert_raw(stem.to_string(), 0, bytes);
        } else if name.ends_with(ATTR_UID_EXT) {
            block.set_uids(read_uid_file(storage, &name)?);
        }
    }

    // All attributes share one row count; derive widths from it.
    let rows = block.uids().len();
    if rows > 0 {
        let derived: Vec<(String, usize)> = block
            .values()
            .iter()
            .map(|(name, bytes)| (name.clone(), bytes.len() / rows))
            .collect();
        for (name, width) in derived {
            let bytes = block.values()[&name].clone();
            block.insert_raw(name, width, bytes);
        }
    }

    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::AHashMap;
    use tempfile::TempDir;

    use crate::storage::{FileStorage, StorageConfig};

    fn create_test_storage() -> (TempDir, FileStorage) {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path(), StorageConfig::default()).unwrap();
        (temp_dir, storage)
    }

    fn sample_block() -> AttributeBlock {
        let mut block = AttributeBlock::new("attrs");
        let widths: AHashMap<String, usize> = [("age".to_string(), 4), ("flag".to_string(), 1)]
            .into_iter()
            .collect();
        let values: AHashMap<String, Vec<u8>> = [
            ("age".to_string(), vec![1, 0, 0, 0, 2, 0, 0, 0]),
            ("flag".to_string(), vec![1, 0]),
        ]
        .into_iter()
        .collect();
        block.append(&widths, &values, &[10, 20]).unwrap();
        block
    }

    #[test]
    fn test_write_then_read_without_manifest() {
        let (_temp_dir, storage) = create_test_storage();
        let codec = AttributesCodec::new();

        codec.write(&storage, &sample_block()).unwrap();

        let read = codec.read(&storage).unwrap();
        assert_eq!(read.uids(), &[10, 20]);
        assert_eq!(read.values()["age"], vec![1, 0, 0, 0, 2, 0, 0, 0]);
        assert_eq!(read.values()["flag"], vec![1, 0]);
        // Derived widths: 8 bytes / 2 rows and 2 bytes / 2 rows.
        assert_eq!(read.byte_widths()["age"], 4);
        assert_eq!(read.byte_widths()["flag"], 1);
    }

    #[test]
    fn test_read_empty_directory_yields_empty_block() {
        let (_temp_dir, storage) = create_test_storage();
        let codec = AttributesCodec::new();

        let read = codec.read(&storage).unwrap();
        assert!(read.is_empty());
        assert!(read.uids().is_empty());
    }

    #[test]
    fn test_files_written_per_attribute() {
        let (_temp_dir, storage) = create_test_storage();
        let codec = AttributesCodec::new();

        codec.write(&storage, &sample_block()).unwrap();

        let files = storage.list_files().unwrap();
        assert_eq!(files, vec!["age.ra", "age.rid", "flag.ra", "flag.rid"]);
    }
}
