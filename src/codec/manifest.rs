//! Per-segment manifest of named blocks.
//!
//! The manifest records block name, file kind, and file names explicitly, so
//! readers do not have to recover structure by scanning the directory and
//! matching extensions. Readers still fall back to the extension scan when a
//! directory predates the manifest.

use serde::{Deserialize, Serialize};

use crate::codec::MANIFEST_FILE;
use crate::error::Result;
use crate::storage::{Storage, StorageOutput};

/// Kind of a manifest block entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// Raw vector payload plus identifier file.
    Vectors,
    /// One scalar attribute's rows plus identifier file.
    Attribute,
}

/// One named block and the files backing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Block name (vector block name or attribute name).
    pub name: String,
    /// What the files contain.
    pub kind: BlockKind,
    /// File holding the raw payload.
    pub raw_file: String,
    /// File holding the parallel identifier array.
    pub uid_file: String,
    /// Fixed row width in bytes, for attribute entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_width: Option<usize>,
}

/// The manifest document persisted under [`MANIFEST_FILE`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentManifest {
    /// All named blocks in the segment.
    pub blocks: Vec<ManifestEntry>,
}

impl SegmentManifest {
    /// Create an empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a block entry.
    pub fn push(&mut self, entry: ManifestEntry) {
        self.blocks.push(entry);
    }

    /// The vector block entry, if the segment has one.
    pub fn vector_block(&self) -> Option<&ManifestEntry> {
        self.blocks
            .iter()
            .find(|entry| entry.kind == BlockKind::Vectors)
    }

    /// All attribute entries.
    pub fn attribute_blocks(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.blocks
            .iter()
            .filter(|entry| entry.kind == BlockKind::Attribute)
    }

    /// Load the manifest from a segment directory. Absence surfaces as the
    /// typed not-found error so callers can fall back to an extension scan.
    pub fn load(storage: &dyn Storage) -> Result<Self> {
        let mut input = storage.open_input(MANIFEST_FILE)?;
        let mut buf = Vec::new();
        std::io::Read::read_to_end(&mut input, &mut buf)?;
        let manifest = serde_json::from_slice(&buf)?;
        Ok(manifest)
    }

    /// Persist the manifest into a segment directory.
    pub fn save(&self, storage: &dyn Storage) -> Result<()> {
        let body = serde_json::to_vec_pretty(self)?;
        let mut output = storage.create_output(MANIFEST_FILE)?;
        std::io::Write::write_all(&mut output, &body)?;
        output.close()?;
        Ok(())
    }
}
