//! Similarity index adapter layer.
//!
//! The segment layer treats a similarity index as an opaque capability:
//! something that can be trained, extended, searched, and turned into a byte
//! blob at a caller-chosen location. Concrete variants are selected by
//! configuration through the [`factory`], and serialized blobs are
//! self-describing so a reader can reconstruct the right variant without
//! out-of-band information.

pub mod binary;
pub mod config;
pub mod factory;
pub mod flat;
pub mod io;

pub use binary::BinaryFlatIndex;
pub use config::{IndexKind, IndexParams, MetricKind};
pub use factory::{create_index, load_index};
pub use flat::FlatIndex;

use crate::error::Result;
use crate::segment::types::DocId;
use crate::storage::Storage;

/// A dataset handed to an index: raw fixed-width rows with their parallel
/// record identifiers. Row width is defined by the index's dimension and
/// element type, not by the dataset itself.
#[derive(Debug, Clone, Copy)]
pub struct IndexDataset<'a> {
    /// Packed row payload.
    pub data: &'a [u8],
    /// One identifier per row.
    pub uids: &'a [DocId],
}

impl<'a> IndexDataset<'a> {
    /// Create a dataset view over raw rows and identifiers.
    pub fn new(data: &'a [u8], uids: &'a [DocId]) -> Self {
        IndexDataset { data, uids }
    }
}

/// One search result. `distance` is metric-native: lower is better for L2,
/// Hamming, and Jaccard; higher is better for inner product and cosine.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Record identifier of the matching row.
    pub uid: DocId,
    /// Metric-native distance or similarity.
    pub distance: f32,
}

/// Capability interface every similarity index variant implements.
pub trait VectorIndex: Send + Sync + std::fmt::Debug {
    /// Which variant this is.
    fn kind(&self) -> IndexKind;

    /// The metric the index ranks by.
    fn metric(&self) -> MetricKind;

    /// Run the variant's training pass over a dataset.
    fn train(&mut self, dataset: &IndexDataset<'_>, params: &IndexParams) -> Result<()>;

    /// Add rows to the index.
    fn add(&mut self, dataset: &IndexDataset<'_>, params: &IndexParams) -> Result<()>;

    /// Rank the `k` best rows for a packed query vector.
    fn search(&self, query: &[u8], k: usize, params: &IndexParams) -> Result<Vec<SearchHit>>;

    /// Number of indexed rows.
    fn count(&self) -> usize;

    /// Vector dimension (elements for float variants, bits for binary ones).
    fn dimension(&self) -> usize;

    /// Persist the index as a self-describing blob under `location`.
    fn serialize(&self, storage: &dyn Storage, location: &str) -> Result<()>;
}
