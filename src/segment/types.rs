//! Core data types staged and persisted by a segment.

use ahash::AHashMap;

use crate::error::{Result, XiphosError};

/// Offset of a logically removed record within a segment.
pub type Offset = u64;

/// External record identifier.
pub type DocId = u64;

/// Append-accumulated list of logically removed record offsets.
///
/// The format does not require offsets to be sorted or unique; the meaning of
/// duplicates is caller-defined. Once persisted, a deletion is never lost by
/// a subsequent write to the same log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletedDocs {
    offsets: Vec<Offset>,
}

impl DeletedDocs {
    /// Create an empty deletion list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a deletion list from existing offsets.
    pub fn from_offsets(offsets: Vec<Offset>) -> Self {
        DeletedDocs { offsets }
    }

    /// Record another deleted offset.
    pub fn push(&mut self, offset: Offset) {
        self.offsets.push(offset);
    }

    /// The recorded offsets, in insertion order.
    pub fn offsets(&self) -> &[Offset] {
        &self.offsets
    }

    /// Number of recorded deletions.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Whether no deletions are recorded.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// Raw fixed-width vector payload for a segment, paired with the parallel
/// array of external record identifiers.
///
/// The codec does not enforce `uids.len() * record_stride == data.len()`;
/// keeping the two in step is the caller's responsibility.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vectors {
    name: String,
    data: Vec<u8>,
    uids: Vec<DocId>,
}

impl Vectors {
    /// Create an empty vector block with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Vectors {
            name: name.into(),
            data: Vec::new(),
            uids: Vec::new(),
        }
    }

    /// The block name (the file stem of its persisted files).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the block.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// The raw vector bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The record identifiers aligned with the payload rows.
    pub fn uids(&self) -> &[DocId] {
        &self.uids
    }

    /// Append raw bytes and their identifiers.
    pub fn append(&mut self, data: &[u8], uids: &[DocId]) {
        self.data.extend_from_slice(data);
        self.uids.extend_from_slice(uids);
    }

    /// Replace the raw payload.
    pub fn set_data(&mut self, data: Vec<u8>) {
        self.data = data;
    }

    /// Replace the identifier array.
    pub fn set_uids(&mut self, uids: Vec<DocId>) {
        self.uids = uids;
    }

    /// Size of the raw payload in bytes.
    pub fn byte_count(&self) -> usize {
        self.data.len()
    }

    /// Number of record identifiers.
    pub fn uid_count(&self) -> usize {
        self.uids.len()
    }

    /// Whether the block holds neither payload nor identifiers.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.uids.is_empty()
    }
}

/// Scalar attribute rows for a segment.
///
/// Each attribute has a fixed byte width and a flat row buffer; all
/// attributes share the `uids` array, one row per identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeBlock {
    name: String,
    byte_widths: AHashMap<String, usize>,
    values: AHashMap<String, Vec<u8>>,
    uids: Vec<DocId>,
}

impl AttributeBlock {
    /// Create an empty attribute block with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        AttributeBlock {
            name: name.into(),
            byte_widths: AHashMap::new(),
            values: AHashMap::new(),
            uids: Vec::new(),
        }
    }

    /// The block name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the block.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Byte width per attribute name.
    pub fn byte_widths(&self) -> &AHashMap<String, usize> {
        &self.byte_widths
    }

    /// Row buffers per attribute name.
    pub fn values(&self) -> &AHashMap<String, Vec<u8>> {
        &self.values
    }

    /// The record identifiers aligned with the attribute rows.
    pub fn uids(&self) -> &[DocId] {
        &self.uids
    }

    /// Attribute names in sorted order, for deterministic serialization.
    pub fn attribute_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.byte_widths.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Whether the block holds no attributes.
    pub fn is_empty(&self) -> bool {
        self.byte_widths.is_empty()
    }

    /// Append rows for a set of attributes.
    ///
    /// Every attribute must carry `uids.len() * byte_width` bytes. Appending
    /// to a non-empty block requires the same attribute set with the same
    /// widths, so all attributes stay aligned with the shared uid array.
    pub fn append(
        &mut self,
        byte_widths: &AHashMap<String, usize>,
        values: &AHashMap<String, Vec<u8>>,
        uids: &[DocId],
    ) -> Result<()> {
        for name in byte_widths.keys() {
            if !values.contains_key(name) {
                return Err(XiphosError::shape_mismatch(format!(
                    "attribute '{name}' declares a byte width but has no values"
                )));
            }
        }
        for name in values.keys() {
            if !byte_widths.contains_key(name) {
                return Err(XiphosError::shape_mismatch(format!(
                    "attribute '{name}' has values but no declared byte width"
                )));
            }
        }

        for (name, width) in byte_widths {
            let expected = uids.len() * width;
            let actual = values[name].len();
            if actual != expected {
                return Err(XiphosError::shape_mismatch(format!(
                    "attribute '{name}': {} uids at width {width} require {expected} bytes, got {actual}",
                    uids.len()
                )));
            }
        }

        if self.byte_widths.is_empty() {
            self.byte_widths = byte_widths.clone();
            for (name, bytes) in values {
                self.values.insert(name.clone(), bytes.clone());
            }
        } else {
            if self.byte_widths.len() != byte_widths.len()
                || byte_widths
                    .iter()
                    .any(|(name, width)| self.byte_widths.get(name) != Some(width))
            {
                return Err(XiphosError::shape_mismatch(
                    "appended attributes must match the already staged attribute set",
                ));
            }
            for (name, bytes) in values {
                self.values
                    .get_mut(name)
                    .expect("attribute set verified above")
                    .extend_from_slice(bytes);
            }
        }
        self.uids.extend_from_slice(uids);

        Ok(())
    }

    /// Install a fully materialized attribute, bypassing append alignment.
    /// Used by codecs reconstructing a block from its persisted files.
    pub(crate) fn insert_raw(&mut self, name: String, width: usize, bytes: Vec<u8>) {
        self.byte_widths.insert(name.clone(), width);
        self.values.insert(name, bytes);
    }

    /// Replace the shared uid array. Used by codecs.
    pub(crate) fn set_uids(&mut self, uids: Vec<DocId>) {
        self.uids = uids;
    }
}
