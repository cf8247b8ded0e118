//! Exact-scan index over bit-packed vectors.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use rayon::prelude::*;
use tracing::error;

use crate::error::{Result, XiphosError};
use crate::index::config::{IndexKind, IndexParams, MetricKind};
use crate::index::io::write_string;
use crate::index::{IndexDataset, SearchHit, VectorIndex};
use crate::segment::types::DocId;
use crate::storage::{Storage, StorageInput, StorageOutput};

/// Row count above which scoring goes data-parallel.
const PARALLEL_THRESHOLD: usize = 4096;

/// Exact similarity index over bit vectors. The dimension is counted in
/// bits and must be a multiple of 8; each row occupies `dimension / 8`
/// bytes.
#[derive(Debug)]
pub struct BinaryFlatIndex {
    dimension: usize,
    metric: MetricKind,
    codes: Vec<u8>,
    uids: Vec<DocId>,
}

impl BinaryFlatIndex {
    /// Create an empty binary flat index.
    pub fn new(dimension: usize, metric: MetricKind) -> Result<Self> {
        if dimension == 0 || dimension % 8 != 0 {
            return Err(XiphosError::index(format!(
                "Binary index dimension must be a positive multiple of 8, got {dimension}"
            )));
        }
        if !metric.is_binary() {
            return Err(XiphosError::index(format!(
                "Metric {} is not valid for a binary index",
                metric.name()
            )));
        }

        Ok(BinaryFlatIndex {
            dimension,
            metric,
            codes: Vec::new(),
            uids: Vec::new(),
        })
    }

    fn code_size(&self) -> usize {
        self.dimension / 8
    }

    fn check_dataset(&self, dataset: &IndexDataset<'_>) -> Result<()> {
        let expected = dataset.uids.len() * self.code_size();
        if dataset.data.len() != expected {
            return Err(XiphosError::index(format!(
                "Dataset carries {} bytes but {} uids at {} bits require {expected}",
                dataset.data.len(),
                dataset.uids.len(),
                self.dimension
            )));
        }
        Ok(())
    }

    fn score(&self, query: &[u8], row: &[u8]) -> f32 {
        match self.metric {
            MetricKind::Hamming => query
                .iter()
                .zip(row.iter())
                .map(|(a, b)| (a ^ b).count_ones())
                .sum::<u32>() as f32,
            MetricKind::Jaccard => {
                let mut intersection = 0u32;
                let mut union = 0u32;
                for (a, b) in query.iter().zip(row.iter()) {
                    intersection += (a & b).count_ones();
                    union += (a | b).count_ones();
                }
                if union == 0 {
                    0.0
                } else {
                    1.0 - intersection as f32 / union as f32
                }
            }
            // Float metrics are rejected at construction.
            _ => unreachable!(),
        }
    }

    /// Reconstruct the payload of a serialized binary index.
    pub(crate) fn read_body(
        input: &mut Box<dyn StorageInput>,
        metric: MetricKind,
        dimension: usize,
        count: usize,
    ) -> Result<Self> {
        let mut index = BinaryFlatIndex::new(dimension, metric)?;

        let mut codes = vec![0u8; count * index.code_size()];
        std::io::Read::read_exact(input, &mut codes)?;
        index.codes = codes;

        index.uids.reserve(count);
        for _ in 0..count {
            index.uids.push(input.read_u64::<LittleEndian>()?);
        }

        Ok(index)
    }
}

impl VectorIndex for BinaryFlatIndex {
    fn kind(&self) -> IndexKind {
        IndexKind::BinaryFlat
    }

    fn metric(&self) -> MetricKind {
        self.metric
    }

    fn train(&mut self, dataset: &IndexDataset<'_>, _params: &IndexParams) -> Result<()> {
        self.check_dataset(dataset)
    }

    fn add(&mut self, dataset: &IndexDataset<'_>, _params: &IndexParams) -> Result<()> {
        self.check_dataset(dataset)?;
        self.codes.extend_from_slice(dataset.data);
        self.uids.extend_from_slice(dataset.uids);
        Ok(())
    }

    fn search(&self, query: &[u8], k: usize, _params: &IndexParams) -> Result<Vec<SearchHit>> {
        if query.len() != self.code_size() {
            return Err(XiphosError::index(format!(
                "Query carries {} bytes, {} bits require {}",
                query.len(),
                self.dimension,
                self.code_size()
            )));
        }

        let rows = self.count();
        let code_size = self.code_size();
        let score_row = |i: usize| -> SearchHit {
            let row = &self.codes[i * code_size..(i + 1) * code_size];
            SearchHit {
                uid: self.uids[i],
                distance: self.score(query, row),
            }
        };

        let mut hits: Vec<SearchHit> = if rows >= PARALLEL_THRESHOLD {
            (0..rows).into_par_iter().map(score_row).collect()
        } else {
            (0..rows).map(score_row).collect()
        };

        hits.sort_unstable_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        Ok(hits)
    }

    fn count(&self) -> usize {
        self.uids.len()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn serialize(&self, storage: &dyn Storage, location: &str) -> Result<()> {
        let mut output = storage.create_output(location).inspect_err(|e| {
            error!(file = %location, error = %e, "failed to create index blob");
        })?;

        write_string(&mut output, self.kind().name())?;
        write_string(&mut output, self.metric.name())?;
        output.write_u32::<LittleEndian>(self.dimension as u32)?;
        output.write_u64::<LittleEndian>(self.count() as u64)?;

        std::io::Write::write_all(&mut output, &self.codes)?;
        for &uid in &self.uids {
            output.write_u64::<LittleEndian>(uid)?;
        }

        output.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_index(metric: MetricKind) -> BinaryFlatIndex {
        let mut index = BinaryFlatIndex::new(8, metric).unwrap();
        let dataset = IndexDataset::new(&[0b0000_0000, 0b1111_0000, 0b1111_1111], &[10, 20, 30]);
        index.add(&dataset, &IndexParams::new()).unwrap();
        index
    }

    #[test]
    fn test_rejects_float_metric() {
        assert!(BinaryFlatIndex::new(8, MetricKind::L2).is_err());
    }

    #[test]
    fn test_rejects_unaligned_dimension() {
        assert!(BinaryFlatIndex::new(12, MetricKind::Hamming).is_err());
    }

    #[test]
    fn test_hamming_search() {
        let index = build_index(MetricKind::Hamming);

        let hits = index
            .search(&[0b1111_0001], 3, &IndexParams::new())
            .unwrap();

        assert_eq!(hits[0].uid, 20);
        assert_eq!(hits[0].distance, 1.0);
        assert_eq!(hits[1].uid, 30);
        assert_eq!(hits[1].distance, 3.0);
    }

    #[test]
    fn test_jaccard_search() {
        let index = build_index(MetricKind::Jaccard);

        let hits = index
            .search(&[0b1111_1111], 1, &IndexParams::new())
            .unwrap();

        assert_eq!(hits[0].uid, 30);
        assert_eq!(hits[0].distance, 0.0);
    }

    #[test]
    fn test_jaccard_empty_query_matches_empty_row() {
        let index = build_index(MetricKind::Jaccard);

        let hits = index.search(&[0u8], 1, &IndexParams::new()).unwrap();
        assert_eq!(hits[0].uid, 10);
        assert_eq!(hits[0].distance, 0.0);
    }

    #[test]
    fn test_add_rejects_misaligned_dataset() {
        let mut index = BinaryFlatIndex::new(16, MetricKind::Hamming).unwrap();
        let dataset = IndexDataset::new(&[0u8; 3], &[1]);
        assert!(index.add(&dataset, &IndexParams::new()).is_err());
    }
}
