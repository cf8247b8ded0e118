//! Binary codecs for segment artifacts.
//!
//! Each codec owns the byte layout of one artifact kind and its read/write
//! contract against a [`crate::storage::Storage`] handle. Every
//! length-prefixed file begins with an 8-byte little-endian unsigned byte
//! count followed by that many bytes of packed fixed-width elements.
//!
//! Codec operations on one artifact are mutually exclusive via a
//! codec-instance lock held for the duration of the call. The lock prevents
//! corruption within a single call; it does not serialize independent codec
//! instances pointed at the same files.

pub mod attributes;
pub mod bloom;
pub mod deleted_docs;
pub mod manifest;
pub mod vectors;

pub use attributes::AttributesCodec;
pub use bloom::BloomFilterCodec;
pub use deleted_docs::DeletedDocsCodec;
pub use manifest::{BlockKind, ManifestEntry, SegmentManifest};
pub use vectors::VectorsCodec;

/// Fixed name of the deletion log within a segment directory.
pub const DELETED_DOCS_FILE: &str = "deleted_docs";

/// Fixed name of the persisted bloom filter.
pub const BLOOM_FILTER_FILE: &str = "bloom_filter";

/// Fixed name of the per-segment manifest.
pub const MANIFEST_FILE: &str = "segment.manifest";

/// Extension of the raw vector payload file.
pub const RAW_VECTOR_EXT: &str = ".rv";

/// Extension of the vector identifier file.
pub const VECTOR_UID_EXT: &str = ".uid";

/// Extension of a raw attribute row file.
pub const RAW_ATTR_EXT: &str = ".ra";

/// Extension of an attribute identifier file. Distinct from
/// [`VECTOR_UID_EXT`] so extension-scan fallbacks cannot confuse attribute
/// rows with the vector block.
pub const ATTR_UID_EXT: &str = ".rid";
