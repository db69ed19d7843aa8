#![cfg(feature = "fjall")]

use std::time::{SystemTime, UNIX_EPOCH};

use blocktree_storage::fjall::FjallStore;
use blocktree_storage::{Column, KeyValueStore, ScanControl, WriteBatch};

#[test]
fn fjall_smoke_roundtrip() {
    let mut dir = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    dir.push(format!("blocktree_fjall_smoke_{nanos}"));

    let store = FjallStore::open(&dir).expect("open fjall");
    store.put(Column::Meta, b"key", b"value").expect("put");
    assert_eq!(
        store.get(Column::Meta, b"key").expect("get"),
        Some(b"value".to_vec())
    );
    assert!(store.exists(Column::Meta, b"key").expect("exists"));

    store.put(Column::Meta, b"scan:1", b"a").expect("put");
    store.put(Column::Meta, b"scan:2", b"b").expect("put");
    let mut seen = Vec::new();
    store
        .for_each_prefix(Column::Meta, b"scan:", &mut |key, value| {
            seen.push((key.to_vec(), value.to_vec()));
            Ok(ScanControl::Continue)
        })
        .expect("scan");
    assert_eq!(
        seen,
        vec![
            (b"scan:1".to_vec(), b"a".to_vec()),
            (b"scan:2".to_vec(), b"b".to_vec()),
        ]
    );

    let mut batch = WriteBatch::new();
    batch.put(Column::Meta, b"batch", b"ok");
    batch.delete(Column::Meta, b"key");
    store.write_batch(&batch).expect("batch commit");

    assert!(store.get(Column::Meta, b"key").expect("get").is_none());
    assert_eq!(
        store.get(Column::Meta, b"batch").expect("get"),
        Some(b"ok".to_vec())
    );

    drop(store);
    let _ = std::fs::remove_dir_all(&dir);
}
