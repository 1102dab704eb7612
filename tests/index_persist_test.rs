mod helpers;

use helpers::{axis, insert_memory, test_db, DIM};
use mindloop::index::VectorIndex;
use mindloop::memory::integrity::verify;
use tempfile::TempDir;

#[test]
fn persisted_index_reloads_ids_and_vectors() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("nested").join("vectors.idx");

    let mut index = VectorIndex::open(&path, Some(DIM)).unwrap();
    assert!(index.is_empty().unwrap());
    index.add("5", &axis(2)).unwrap();
    index.add("other", &axis(4)).unwrap();
    index.persist().unwrap();
    assert!(path.exists());

    let reloaded = VectorIndex::open(&path, Some(DIM)).unwrap();
    assert_eq!(reloaded.len().unwrap(), 2);
    assert_eq!(reloaded.dim(), Some(DIM));
    let hits = reloaded.search(&axis(2), 1).unwrap();
    assert_eq!(hits[0].0, "5");
    assert!((hits[0].1 - 1.0).abs() < 1e-5);
}

#[test]
fn slots_keep_counting_after_reload() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("vectors.idx");

    let mut index = VectorIndex::open(&path, None).unwrap();
    let first = index.add("a", &axis(0)).unwrap();
    index.remove("a").unwrap();
    index.persist().unwrap();

    let mut reloaded = VectorIndex::open(&path, None).unwrap();
    let next = reloaded.add("b", &axis(1)).unwrap();
    assert!(next > first);
}

#[test]
fn dimension_mismatch_on_open_starts_empty() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("vectors.idx");

    let mut index = VectorIndex::open(&path, Some(DIM)).unwrap();
    index.add("a", &axis(0)).unwrap();
    index.persist().unwrap();

    let mut wider = VectorIndex::open(&path, Some(DIM * 2)).unwrap();
    assert!(wider.is_empty().unwrap());
    assert_eq!(wider.dim(), None);
    wider.add("b", &vec![1.0; DIM * 2]).unwrap();
    assert_eq!(wider.dim(), Some(DIM * 2));
}

#[test]
fn text_store_and_persisted_index_stay_in_step() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("vectors.idx");
    let mut conn = test_db();

    let mut index = VectorIndex::open(&path, Some(DIM)).unwrap();
    insert_memory(&mut conn, &mut index, "first", &axis(0));
    insert_memory(&mut conn, &mut index, "second", &axis(1));
    index.persist().unwrap();

    let reloaded = VectorIndex::open(&path, Some(DIM)).unwrap();
    let report = verify(&conn, &reloaded).unwrap();
    assert!(report.is_consistent());
    assert_eq!(report.memories, 2);
    assert_eq!(report.indexed, 2);
}

#[test]
fn unpersisted_changes_are_lost() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("vectors.idx");

    let mut index = VectorIndex::open(&path, Some(DIM)).unwrap();
    index.add("a", &axis(0)).unwrap();
    index.persist().unwrap();
    index.add("b", &axis(1)).unwrap();
    drop(index);

    let reloaded = VectorIndex::open(&path, Some(DIM)).unwrap();
    assert_eq!(reloaded.len().unwrap(), 1);
    assert!(reloaded.slot_of("b").unwrap().is_none());
}
