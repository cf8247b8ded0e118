//! Exact-scan index over f32 vectors.

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
const PARALLEL_THRESHOLD: usize = 1024;

/// Exact similarity index: every query scans every stored vector.
#[derive(Debug)]
pub struct FlatIndex {
    dimension: usize,
    metric: MetricKind,
    vectors: Vec<f32>,
    uids: Vec<DocId>,
}

impl FlatIndex {
    /// Create an empty flat index.
    pub fn new(dimension: usize, metric: MetricKind) -> Result<Self> {
        if dimension == 0 {
            return Err(XiphosError::index("Flat index dimension must be non-zero"));
        }
        if metric.is_binary() {
            return Err(XiphosError::index(format!(
                "Metric {} is not valid for a flat f32 index",
                metric.name()
            )));
        }

        Ok(FlatIndex {
            dimension,
            metric,
            vectors: Vec::new(),
            uids: Vec::new(),
        })
    }

    fn row_bytes(&self) -> usize {
        self.dimension * 4
    }

    fn decode_rows(&self, dataset: &IndexDataset<'_>) -> Result<Vec<f32>> {
        let expected = dataset.uids.len() * self.row_bytes();
        if dataset.data.len() != expected {
            return Err(XiphosError::index(format!(
                "Dataset carries {} bytes but {} uids at dimension {} require {expected}",
                dataset.data.len(),
                dataset.uids.len(),
                self.dimension
            )));
        }

        Ok(dataset
            .data
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes(chunk.try_into().unwrap()))
            .collect())
    }

    fn score(&self, query: &[f32], row: &[f32]) -> f32 {
        match self.metric {
            MetricKind::L2 => query
                .iter()
                .zip(row.iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum(),
            MetricKind::InnerProduct => query.iter().zip(row.iter()).map(|(a, b)| a * b).sum(),
            MetricKind::Cosine => {
                let dot: f32 = query.iter().zip(row.iter()).map(|(a, b)| a * b).sum();
                let norm_q: f32 = query.iter().map(|a| a * a).sum::<f32>().sqrt();
                let norm_r: f32 = row.iter().map(|a| a * a).sum::<f32>().sqrt();
                if norm_q == 0.0 || norm_r == 0.0 {
                    0.0
                } else {
                    dot / (norm_q * norm_r)
                }
            }
            // Binary metrics are rejected at construction.
            MetricKind::Hamming | MetricKind::Jaccard => unreachable!(),
        }
    }

    /// Reconstruct the payload of a serialized flat index.
    pub(crate) fn read_body(
        input: &mut Box<dyn StorageInput>,
        metric: MetricKind,
        dimension: usize,
        count: usize,
    ) -> Result<Self> {
        let mut index = FlatIndex::new(dimension, metric)?;

        index.vectors.reserve(count * dimension);
        for _ in 0..count * dimension {
            index.vectors.push(input.read_f32::<LittleEndian>()?);
        }

        index.uids.reserve(count);
        for _ in 0..count {
            index.uids.push(input.read_u64::<LittleEndian>()?);
        }

        Ok(index)
    }
}

impl VectorIndex for FlatIndex {
    fn kind(&self) -> IndexKind {
        IndexKind::Flat
    }

    fn metric(&self) -> MetricKind {
        self.metric
    }

    fn train(&mut self, dataset: &IndexDataset<'_>, _params: &IndexParams) -> Result<()> {
        // An exact scan has no trained state; validate the dataset shape so
        // misconfigured callers fail here instead of at add time.
        self.decode_rows(dataset)?;
        Ok(())
    }

    fn add(&mut self, dataset: &IndexDataset<'_>, _params: &IndexParams) -> Result<()> {
        let rows = self.decode_rows(dataset)?;
        self.vectors.extend_from_slice(&rows);
        self.uids.extend_from_slice(dataset.uids);
        Ok(())
    }

    fn search(&self, query: &[u8], k: usize, _params: &IndexParams) -> Result<Vec<SearchHit>> {
        if query.len() != self.row_bytes() {
            return Err(XiphosError::index(format!(
                "Query carries {} bytes, dimension {} requires {}",
                query.len(),
                self.dimension,
                self.row_bytes()
            )));
        }

        let query: Vec<f32> = query
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes(chunk.try_into().unwrap()))
            .collect();

        let rows = self.count();
        let score_row = |i: usize| -> SearchHit {
            let row = &self.vectors[i * self.dimension..(i + 1) * self.dimension];
            SearchHit {
                uid: self.uids[i],
                distance: self.score(&query, row),
            }
        };

        let mut hits: Vec<SearchHit> = if rows >= PARALLEL_THRESHOLD {
            (0..rows).into_par_iter().map(score_row).collect()
        } else {
            (0..rows).map(score_row).collect()
        };

        if self.metric.higher_is_better() {
            hits.sort_unstable_by(|a, b| b.distance.total_cmp(&a.distance));
        } else {
            hits.sort_unstable_by(|a, b| a.distance.total_cmp(&b.distance));
        }
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

        for &value in &self.vectors {
            output.write_f32::<LittleEndian>(value)?;
        }
        for &uid in &self.uids {
            output.write_u64::<LittleEndian>(uid)?;
        }

        output.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packed(rows: &[&[f32]]) -> Vec<u8> {
        rows.iter()
            .flat_map(|row| row.iter().flat_map(|v| v.to_le_bytes()))
            .collect()
    }

    fn build_index(metric: MetricKind) -> FlatIndex {
        let mut index = FlatIndex::new(2, metric).unwrap();
        let data = packed(&[&[0.0, 0.0], &[1.0, 0.0], &[0.0, 2.0]]);
        let dataset = IndexDataset::new(&data, &[10, 20, 30]);
        let params = IndexParams::new();
        index.train(&dataset, &params).unwrap();
        index.add(&dataset, &params).unwrap();
        index
    }

    #[test]
    fn test_rejects_binary_metric() {
        assert!(FlatIndex::new(4, MetricKind::Hamming).is_err());
    }

    #[test]
    fn test_add_tracks_count_and_dimension() {
        let index = build_index(MetricKind::L2);
        assert_eq!(index.count(), 3);
        assert_eq!(index.dimension(), 2);
    }

    #[test]
    fn test_add_rejects_misaligned_dataset() {
        let mut index = FlatIndex::new(2, MetricKind::L2).unwrap();
        let data = packed(&[&[1.0, 2.0]]);
        let dataset = IndexDataset::new(&data, &[1, 2]);

        assert!(index.add(&dataset, &IndexParams::new()).is_err());
    }

    #[test]
    fn test_l2_search_ranks_nearest_first() {
        let index = build_index(MetricKind::L2);

        let query: Vec<u8> = packed(&[&[0.9, 0.0]]);
        let hits = index.search(&query, 2, &IndexParams::new()).unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].uid, 20);
        assert_eq!(hits[1].uid, 10);
    }

    #[test]
    fn test_inner_product_ranks_highest_first() {
        let index = build_index(MetricKind::InnerProduct);

        let query: Vec<u8> = packed(&[&[0.0, 1.0]]);
        let hits = index.search(&query, 3, &IndexParams::new()).unwrap();

        assert_eq!(hits[0].uid, 30);
        assert!((hits[0].distance - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_search_rejects_bad_query_length() {
        let index = build_index(MetricKind::L2);
        assert!(index.search(&[0u8; 3], 1, &IndexParams::new()).is_err());
    }
}
