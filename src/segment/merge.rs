//! Segment merge engine.
//!
//! A merge reads two segments' artifacts and writes a combined segment into
//! a third directory: vectors and identifiers concatenated left-then-right,
//! attributes unioned by name, deletion logs combined through the additive
//! write protocol. The similarity index is never merged; a merged segment
//! starts without a trained index and retraining is the caller's concern.
//! Neither source segment is deleted.

use std::sync::Arc;

use ahash::AHashMap;
use tracing::debug;

use crate::error::{Result, XiphosError};
use crate::segment::reader::SegmentReader;
use crate::segment::types::{AttributeBlock, DeletedDocs, DocId};
use crate::segment::writer::SegmentWriter;
use crate::storage::Storage;

/// Engine that merges segment pairs into one target directory.
#[derive(Debug)]
pub struct SegmentMerger {
    target: Arc<dyn Storage>,
}

impl SegmentMerger {
    /// Create a merger writing into the given target directory.
    pub fn new(target: Arc<dyn Storage>) -> Self {
        SegmentMerger { target }
    }

    /// Merge the segments at `left` and `right` into the target directory,
    /// with `name` as the merged vector block's name. Returns the persisted
    /// writer for the merged segment.
    pub fn merge(
        &self,
        left: Arc<dyn Storage>,
        right: Arc<dyn Storage>,
        name: &str,
    ) -> Result<SegmentWriter> {
        let left_reader = SegmentReader::new(left);
        let right_reader = SegmentReader::new(right);

        let left_vectors = left_reader.load_vectors()?;
        let right_vectors = right_reader.load_vectors()?;

        let mut writer = SegmentWriter::new(Arc::clone(&self.target))?;

        let mut data = Vec::with_capacity(left_vectors.byte_count() + right_vectors.byte_count());
        data.extend_from_slice(left_vectors.data());
        data.extend_from_slice(right_vectors.data());

        let mut uids: Vec<DocId> =
            Vec::with_capacity(left_vectors.uid_count() + right_vectors.uid_count());
        uids.extend_from_slice(left_vectors.uids());
        uids.extend_from_slice(right_vectors.uids());

        writer.add_vectors(name, &data, &uids)?;

        let left_attributes = left_reader.load_attributes()?;
        let right_attributes = right_reader.load_attributes()?;
        if !left_attributes.is_empty() || !right_attributes.is_empty() {
            let (widths, values, attr_uids) =
                union_attributes(&left_attributes, &right_attributes)?;
            writer.add_attributes(name, &widths, &values, &attr_uids)?;
        }

        writer.build_bloom_filter();
        writer.serialize()?;

        // Two additive writes, one per source; a source without an
        // initialized log contributes nothing.
        for reader in [&left_reader, &right_reader] {
            let deleted = match reader.load_deleted_docs() {
                Ok(deleted) => deleted,
                Err(XiphosError::NotFound(_)) => DeletedDocs::new(),
                Err(e) => return Err(e),
            };
            writer.write_deleted_docs(&deleted)?;
        }

        debug!(
            rows = writer.row_count(),
            bytes = writer.vector_byte_count(),
            block = name,
            "segments merged"
        );
        Ok(writer)
    }
}

/// Union two attribute blocks by name.
///
/// An attribute present in both sources must have the same byte width. An
/// attribute missing on one side is padded with zero rows there, so every
/// attribute stays aligned with the concatenated uid array.
fn union_attributes(
    left: &AttributeBlock,
    right: &AttributeBlock,
) -> Result<(AHashMap<String, usize>, AHashMap<String, Vec<u8>>, Vec<DocId>)> {
    let left_rows = left.uids().len();
    let right_rows = right.uids().len();

    let mut widths: AHashMap<String, usize> = AHashMap::new();
    for (name, &width) in left.byte_widths() {
        widths.insert(name.clone(), width);
    }
    for (name, &width) in right.byte_widths() {
        if let Some(&existing) = widths.get(name) {
            if existing != width {
                return Err(XiphosError::shape_mismatch(format!(
                    "attribute '{name}' has byte width {existing} in one segment and {width} in the other"
                )));
            }
        } else {
            widths.insert(name.clone(), width);
        }
    }

    let mut values: AHashMap<String, Vec<u8>> = AHashMap::new();
    for (name, &width) in &widths {
        let mut merged = Vec::with_capacity((left_rows + right_rows) * width);
        match left.values().get(name) {
            Some(bytes) => merged.extend_from_slice(bytes),
            None => merged.resize(left_rows * width, 0),
        }
        match right.values().get(name) {
            Some(bytes) => merged.extend_from_slice(bytes),
            None => merged.resize(left_rows * width + right_rows * width, 0),
        }
        values.insert(name.clone(), merged);
    }

    let mut uids = Vec::with_capacity(left_rows + right_rows);
    uids.extend_from_slice(left.uids());
    uids.extend_from_slice(right.uids());

    Ok((widths, values, uids))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(pairs: &[(&str, usize, Vec<u8>)], uids: &[DocId]) -> AttributeBlock {
        let mut result = AttributeBlock::new("attrs");
        let widths: AHashMap<String, usize> = pairs
            .iter()
            .map(|(name, width, _)| (name.to_string(), *width))
            .collect();
        let values: AHashMap<String, Vec<u8>> = pairs
            .iter()
            .map(|(name, _, bytes)| (name.to_string(), bytes.clone()))
            .collect();
        result.append(&widths, &values, uids).unwrap();
        result
    }

    #[test]
    fn test_union_concatenates_shared_attribute() {
        let left = block(&[("age", 1, vec![1, 2])], &[10, 20]);
        let right = block(&[("age", 1, vec![3])], &[30]);

        let (widths, values, uids) = union_attributes(&left, &right).unwrap();

        assert_eq!(widths["age"], 1);
        assert_eq!(values["age"], vec![1, 2, 3]);
        assert_eq!(uids, vec![10, 20, 30]);
    }

    #[test]
    fn test_union_pads_one_sided_attribute() {
        let left = block(&[("age", 1, vec![1, 2])], &[10, 20]);
        let right = block(&[("flag", 1, vec![9])], &[30]);

        let (widths, values, uids) = union_attributes(&left, &right).unwrap();

        assert_eq!(widths.len(), 2);
        assert_eq!(values["age"], vec![1, 2, 0]);
        assert_eq!(values["flag"], vec![0, 0, 9]);
        assert_eq!(uids, vec![10, 20, 30]);
    }

    #[test]
    fn test_union_rejects_width_conflict() {
        let left = block(&[("age", 1, vec![1])], &[10]);
        let right = block(&[("age", 2, vec![0, 0])], &[20]);

        let err = union_attributes(&left, &right).unwrap_err();
        assert!(matches!(err, XiphosError::ShapeMismatch(_)));
    }
}
