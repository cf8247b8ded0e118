//! Segment aggregate: staging, serialization, loading, and merge.
//!
//! A segment is the unit of persisted vector-search data: one directory's
//! worth of vectors, identifiers, attributes, deletion log, bloom filter,
//! and similarity-index blob. [`SegmentWriter`] stages artifacts in memory
//! and flushes them through the codecs; [`SegmentReader`] loads them back;
//! [`SegmentMerger`] combines two persisted segments into a third.

pub mod bloom;
pub mod merge;
pub mod reader;
pub mod types;
pub mod writer;

pub use bloom::IdBloomFilter;
pub use merge::SegmentMerger;
pub use reader::SegmentReader;
pub use types::{AttributeBlock, DeletedDocs, DocId, Offset, Vectors};
pub use writer::SegmentWriter;
