//! Vector blob codec.
//!
//! A vector block persists as two files: `{name}.rv` holding the raw
//! fixed-width payload and `{name}.uid` holding the packed identifiers, each
//! laid out as `[8-byte LE byte-count][body]`. The two writes are
//! independent, not transactional: a failure after the raw file landed
//! leaves it in place and surfaces as a partial-write error.
//!
//! Readers resolve block structure through the segment manifest. Directories
//! without a manifest fall back to scanning the listing and matching
//! extensions; on that path a directory is expected to hold at most one
//! vector block, and later raw files in listing order win over earlier ones.

use std::io::{Read, Seek, SeekFrom};
use std::time::Instant;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use parking_lot::Mutex;
use tracing::{debug, error};

use crate::codec::manifest::SegmentManifest;
use crate::codec::{RAW_VECTOR_EXT, VECTOR_UID_EXT};
use crate::error::{Result, XiphosError};
use crate::segment::types::{DocId, Vectors};
use crate::storage::{Storage, StorageInput, StorageOutput};

/// Codec for the per-segment vector block.
#[derive(Debug, Default)]
pub struct VectorsCodec {
    mutex: Mutex<()>,
}

impl VectorsCodec {
    /// Create a new codec instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write both files of a vector block.
    pub fn write(&self, storage: &dyn Storage, vectors: &Vectors) -> Result<()> {
        let _guard = self.mutex.lock();

        let raw_file = format!("{}{}", vectors.name(), RAW_VECTOR_EXT);
        let uid_file = format!("{}{}", vectors.name(), VECTOR_UID_EXT);
        let started = Instant::now();

        write_blob(storage, &raw_file, vectors.data())?;

        write_uids(storage, &uid_file, vectors.uids()).map_err(|e| {
            error!(file = %uid_file, error = %e, "identifier write failed after raw file landed");
            XiphosError::partial_write(format!(
                "identifier file {uid_file} failed after raw file {raw_file} was written: {e}"
            ))
        })?;

        debug!(
            raw_bytes = vectors.byte_count(),
            uids = vectors.uid_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "vector block written"
        );
        Ok(())
    }

    /// Read the segment's vector block.
    ///
    /// A segment without a vector block yields an empty, unnamed block.
    pub fn read(&self, storage: &dyn Storage) -> Result<Vectors> {
        let _guard = self.mutex.lock();

        match SegmentManifest::load(storage) {
            Ok(manifest) => {
                let mut vectors = Vectors::default();
                if let Some(entry) = manifest.vector_block() {
                    vectors.set_name(entry.name.clone());
                    vectors.set_data(read_raw(storage, &entry.raw_file, 0, u64::MAX)?);
                    vectors.set_uids(read_uid_file(storage, &entry.uid_file)?);
                }
                Ok(vectors)
            }
            Err(XiphosError::NotFound(_)) => read_by_extension(storage),
            Err(e) => Err(e),
        }
    }

    /// Read a byte range of the raw payload.
    ///
    /// `num_bytes` is clamped to the stored extent; an `offset` beyond the
    /// extent is rejected outright rather than clamped.
    pub fn read_range(&self, storage: &dyn Storage, offset: u64, num_bytes: u64) -> Result<Vec<u8>> {
        let _guard = self.mutex.lock();

        let raw_file = find_raw_file(storage)?.ok_or_else(|| {
            XiphosError::not_found("no vector block in segment directory".to_string())
        })?;

        read_raw(storage, &raw_file, offset, num_bytes)
    }

    /// Read only the identifier array.
    pub fn read_uids(&self, storage: &dyn Storage) -> Result<Vec<DocId>> {
        let _guard = self.mutex.lock();

        match SegmentManifest::load(storage) {
            Ok(manifest) => match manifest.vector_block() {
                Some(entry) => read_uid_file(storage, &entry.uid_file),
                None => Ok(Vec::new()),
            },
            Err(XiphosError::NotFound(_)) => {
                let mut uids = Vec::new();
                for name in storage.list_files()? {
                    if name.ends_with(VECTOR_UID_EXT) {
                        uids = read_uid_file(storage, &name)?;
                    }
                }
                Ok(uids)
            }
            Err(e) => Err(e),
        }
    }
}

/// Write one length-prefixed blob.
pub(crate) fn write_blob(storage: &dyn Storage, name: &str, body: &[u8]) -> Result<()> {
    let mut output = storage.create_output(name).inspect_err(|e| {
        error!(file = %name, error = %e, "failed to create blob");
    })?;
    output.write_u64::<LittleEndian>(body.len() as u64)?;
    output.write_all(body)?;
    output.close()
}

/// Write one length-prefixed array of 64-bit identifiers.
pub(crate) fn write_uids(storage: &dyn Storage, name: &str, uids: &[DocId]) -> Result<()> {
    let mut output = storage.create_output(name).inspect_err(|e| {
        error!(file = %name, error = %e, "failed to create blob");
    })?;
    output.write_u64::<LittleEndian>(uids.len() as u64 * 8)?;
    for &uid in uids {
        output.write_u64::<LittleEndian>(uid)?;
    }
    output.close()
}

/// Read a byte range from a length-prefixed blob, clamping the length but
/// rejecting an out-of-range start offset.
pub(crate) fn read_raw(
    storage: &dyn Storage,
    name: &str,
    offset: u64,
    num_bytes: u64,
) -> Result<Vec<u8>> {
    let mut input = storage.open_input(name).inspect_err(|e| {
        error!(file = %name, error = %e, "failed to open blob");
    })?;

    let extent = input.read_u64::<LittleEndian>()?;
    if offset > extent {
        error!(file = %name, offset, extent, "ranged read beyond stored extent");
        return Err(XiphosError::RangeOutOfBounds { offset, extent });
    }

    let clamped = num_bytes.min(extent - offset);
    input.seek(SeekFrom::Start(8 + offset))?;

    let mut body = vec![0u8; clamped as usize];
    input.read_exact(&mut body)?;
    input.close()?;
    Ok(body)
}

/// Read a length-prefixed array of 64-bit identifiers.
pub(crate) fn read_uid_file(storage: &dyn Storage, name: &str) -> Result<Vec<DocId>> {
    let mut input = storage.open_input(name).inspect_err(|e| {
        error!(file = %name, error = %e, "failed to open blob");
    })?;

    let num_bytes = input.read_u64::<LittleEndian>()?;
    let count = (num_bytes / 8) as usize;

    let mut uids = Vec::with_capacity(count);
    for _ in 0..count {
        uids.push(input.read_u64::<LittleEndian>()?);
    }
    input.close()?;
    Ok(uids)
}

/// Legacy read path: recover the block by listing the directory and matching
/// extensions. Later raw files in listing order overwrite earlier ones.
fn read_by_extension(storage: &dyn Storage) -> Result<Vectors> {
    let mut vectors = Vectors::default();

    for name in storage.list_files()? {
        if let Some(stem) = name.strip_suffix(RAW_VECTOR_EXT) {
            vectors.set_name(stem.to_string());
            vectors.set_data(read_raw(storage, &name, 0, u64::MAX)?);
        } else if name.ends_with(VECTOR_UID_EXT) {
            vectors.set_uids(read_uid_file(storage, &name)?);
        }
    }

    Ok(vectors)
}

/// Resolve the raw payload file, via the manifest or the extension fallback.
fn find_raw_file(storage: &dyn Storage) -> Result<Option<String>> {
    match SegmentManifest::load(storage) {
        Ok(manifest) => Ok(manifest.vector_block().map(|entry| entry.raw_file.clone())),
        Err(XiphosError::NotFound(_)) => {
            let mut raw_file = None;
            for name in storage.list_files()? {
                if name.ends_with(RAW_VECTOR_EXT) {
                    raw_file = Some(name);
                }
            }
            Ok(raw_file)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStorage, StorageConfig};
    use tempfile::TempDir;

    fn create_test_storage() -> (TempDir, FileStorage) {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path(), StorageConfig::default()).unwrap();
        (temp_dir, storage)
    }

    fn sample_block() -> Vectors {
        let mut vectors = Vectors::new("v");
        vectors.append(&[0, 1, 2, 3, 4, 5], &[1234, 5678, 9012]);
        vectors
    }

    #[test]
    fn test_write_then_read_without_manifest() {
        let (_temp_dir, storage) = create_test_storage();
        let codec = VectorsCodec::new();

        codec.write(&storage, &sample_block()).unwrap();

        // No manifest written: the extension fallback recovers the block.
        let read = codec.read(&storage).unwrap();
        assert_eq!(read.name(), "v");
        assert_eq!(read.data(), &[0, 1, 2, 3, 4, 5]);
        assert_eq!(read.uids(), &[1234, 5678, 9012]);
    }

    #[test]
    fn test_read_empty_directory_yields_empty_block() {
        let (_temp_dir, storage) = create_test_storage();
        let codec = VectorsCodec::new();

        let read = codec.read(&storage).unwrap();
        assert!(read.is_empty());
        assert_eq!(read.name(), "");
    }

    #[test]
    fn test_read_uids_only() {
        let (_temp_dir, storage) = create_test_storage();
        let codec = VectorsCodec::new();

        codec.write(&storage, &sample_block()).unwrap();

        let uids = codec.read_uids(&storage).unwrap();
        assert_eq!(uids, vec![1234, 5678, 9012]);
    }

    #[test]
    fn test_read_range_clamps_length() {
        let (_temp_dir, storage) = create_test_storage();
        let codec = VectorsCodec::new();

        codec.write(&storage, &sample_block()).unwrap();

        let bytes = codec.read_range(&storage, 0, 6 + 1000).unwrap();
        assert_eq!(bytes, vec![0, 1, 2, 3, 4, 5]);

        let bytes = codec.read_range(&storage, 2, 2).unwrap();
        assert_eq!(bytes, vec![2, 3]);

        // Offset at the exact extent reads zero bytes.
        let bytes = codec.read_range(&storage, 6, 1).unwrap();
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_read_range_rejects_offset_beyond_extent() {
        let (_temp_dir, storage) = create_test_storage();
        let codec = VectorsCodec::new();

        codec.write(&storage, &sample_block()).unwrap();

        let err = codec.read_range(&storage, 7, 1).unwrap_err();
        match err {
            XiphosError::RangeOutOfBounds { offset, extent } => {
                assert_eq!(offset, 7);
                assert_eq!(extent, 6);
            }
            other => panic!("expected RangeOutOfBounds, got {other}"),
        }
    }

    #[test]
    fn test_read_range_without_block_is_not_found() {
        let (_temp_dir, storage) = create_test_storage();
        let codec = VectorsCodec::new();

        let err = codec.read_range(&storage, 0, 1).unwrap_err();
        assert!(matches!(err, XiphosError::NotFound(_)));
    }

    #[test]
    fn test_manifest_read_ignores_stray_files() {
        use crate::codec::manifest::{BlockKind, ManifestEntry};

        let (_temp_dir, storage) = create_test_storage();
        let codec = VectorsCodec::new();

        codec.write(&storage, &sample_block()).unwrap();

        // A stray raw file that the manifest does not mention.
        write_blob(&storage, "stray.rv", &[9, 9]).unwrap();

        let mut manifest = SegmentManifest::new();
        manifest.push(ManifestEntry {
            name: "v".to_string(),
            kind: BlockKind::Vectors,
            raw_file: "v.rv".to_string(),
            uid_file: "v.uid".to_string(),
            byte_width: None,
        });
        manifest.save(&storage).unwrap();

        let read = codec.read(&storage).unwrap();
        assert_eq!(read.name(), "v");
        assert_eq!(read.data(), &[0, 1, 2, 3, 4, 5]);
    }
}
