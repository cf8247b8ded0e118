//! Index construction and blob loading keyed by configuration.

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::error;

use crate::error::Result;
use crate::index::binary::BinaryFlatIndex;
use crate::index::config::{IndexKind, IndexParams, MetricKind};
use crate::index::flat::FlatIndex;
use crate::index::io::read_string;
use crate::index::VectorIndex;
use crate::storage::Storage;

/// Create an empty index of the configured kind.
///
/// Every variant requires `dimension`; the metric defaults to L2, which the
/// binary variant rejects, so binary indexes must configure `metric`
/// explicitly.
pub fn create_index(kind: IndexKind, params: &IndexParams) -> Result<Box<dyn VectorIndex>> {
    let dimension = params.dimension()?;
    let metric = params.metric()?;

    match kind {
        IndexKind::Flat => Ok(Box::new(FlatIndex::new(dimension, metric)?)),
        IndexKind::BinaryFlat => Ok(Box::new(BinaryFlatIndex::new(dimension, metric)?)),
    }
}

/// Load a serialized index blob, dispatching on its kind tag.
pub fn load_index(storage: &dyn Storage, location: &str) -> Result<Box<dyn VectorIndex>> {
    let mut input = storage.open_input(location).inspect_err(|e| {
        error!(file = %location, error = %e, "failed to open index blob");
    })?;

    let kind = IndexKind::parse_str(&read_string(&mut input)?)?;
    let metric = MetricKind::parse_str(&read_string(&mut input)?)?;
    let dimension = input.read_u32::<LittleEndian>()? as usize;
    let count = input.read_u64::<LittleEndian>()? as usize;

    let index: Box<dyn VectorIndex> = match kind {
        IndexKind::Flat => Box::new(FlatIndex::read_body(&mut input, metric, dimension, count)?),
        IndexKind::BinaryFlat => Box::new(BinaryFlatIndex::read_body(
            &mut input, metric, dimension, count,
        )?),
    };

    Ok(index)
}
