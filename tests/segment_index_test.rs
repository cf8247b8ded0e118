//! Integration tests for similarity-index persistence through a segment.

use std::sync::Arc;

use rand::Rng;
use tempfile::TempDir;

use xiphos::error::XiphosError;
use xiphos::index::{create_index, IndexDataset, IndexKind, IndexParams, MetricKind};
use xiphos::segment::{SegmentReader, SegmentWriter};
use xiphos::storage::{FileStorage, Storage, StorageConfig};

const DIM: usize = 16;
const ROWS: usize = 200;

fn file_segment(temp_dir: &TempDir, name: &str) -> Arc<dyn Storage> {
    Arc::new(FileStorage::new(temp_dir.path().join(name), StorageConfig::default()).unwrap())
}

fn random_rows(rows: usize) -> (Vec<u8>, Vec<u64>) {
    let mut rng = rand::rng();
    let data: Vec<u8> = (0..rows * DIM)
        .flat_map(|_| rng.random::<f32>().to_le_bytes())
        .collect();
    let uids: Vec<u64> = (0..rows as u64).collect();
    (data, uids)
}

#[test]
fn test_index_write_and_reload_through_segment() {
    let temp_dir = TempDir::new().unwrap();

    let params = IndexParams::new()
        .set("dimension", DIM)
        .set("metric", "l2");
    let (data, uids) = random_rows(ROWS);

    {
        let mut index = create_index(IndexKind::Flat, &params).unwrap();
        let dataset = IndexDataset::new(&data, &uids);
        index.train(&dataset, &params).unwrap();
        index.add(&dataset, &params).unwrap();
        assert_eq!(index.count(), ROWS);
        assert_eq!(index.dimension(), DIM);

        let mut writer = SegmentWriter::new(file_segment(&temp_dir, "seg")).unwrap();
        writer.set_vector_index(index);

        // The index location is a sibling directory, not the segment's own.
        let location = file_segment(&temp_dir, "seg_index");
        writer.write_vector_index(&*location, "index").unwrap();
    }

    let reader = SegmentReader::new(file_segment(&temp_dir, "seg"));
    let location = file_segment(&temp_dir, "seg_index");
    let index = reader.load_vector_index(&*location, "index").unwrap();

    assert_eq!(index.kind(), IndexKind::Flat);
    assert_eq!(index.metric(), MetricKind::L2);
    assert_eq!(index.count(), ROWS);
    assert_eq!(index.dimension(), DIM);

    // Searching for a stored row returns its own uid first with distance 0.
    let row = &data[5 * DIM * 4..6 * DIM * 4];
    let params = IndexParams::new();
    let hits = index.search(row, 3, &params).unwrap();
    assert_eq!(hits[0].uid, 5);
    assert!(hits[0].distance.abs() < 1e-6);
}

#[test]
fn test_write_index_without_setting_one_fails() {
    let temp_dir = TempDir::new().unwrap();

    let writer = SegmentWriter::new(file_segment(&temp_dir, "seg")).unwrap();
    let location = file_segment(&temp_dir, "seg_index");

    let err = writer.write_vector_index(&*location, "index").unwrap_err();
    assert!(matches!(err, XiphosError::InvalidOperation(_)));
}

#[test]
fn test_binary_index_roundtrip_through_segment() {
    let temp_dir = TempDir::new().unwrap();

    let params = IndexParams::new()
        .set("dimension", 64)
        .set("metric", "hamming");
    let mut rng = rand::rng();
    let data: Vec<u8> = (0..50 * 8).map(|_| rng.random()).collect();
    let uids: Vec<u64> = (0..50).collect();

    {
        let mut index = create_index(IndexKind::BinaryFlat, &params).unwrap();
        index
            .add(&IndexDataset::new(&data, &uids), &params)
            .unwrap();

        let mut writer = SegmentWriter::new(file_segment(&temp_dir, "seg")).unwrap();
        writer.set_vector_index(index);
        writer
            .write_vector_index(&*file_segment(&temp_dir, "seg"), "index")
            .unwrap();
    }

    let reader = SegmentReader::new(file_segment(&temp_dir, "seg"));
    let index = reader
        .load_vector_index(&*file_segment(&temp_dir, "seg"), "index")
        .unwrap();

    assert_eq!(index.kind(), IndexKind::BinaryFlat);
    assert_eq!(index.metric(), MetricKind::Hamming);
    assert_eq!(index.count(), 50);

    let query = &data[0..8];
    let hits = index.search(query, 1, &IndexParams::new()).unwrap();
    assert_eq!(hits[0].uid, 0);
    assert_eq!(hits[0].distance, 0.0);
}
