//! RocksDB Store implementation
//!
//! Implements `OrderedStore` on top of a single RocksDB instance.

use crate::traits::{
    range_is_empty, KvPair, OrderedStore, StoreError, StoreResult, StoreSnapshot, WriteOp,
};
use bytes::Bytes;
use rocksdb::{
    Direction, IteratorMode, Options, ReadOptions, Snapshot, WriteBatch, WriteOptions, DB,
};
use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

/// RocksDB-based ordered store
pub struct RocksStore {
    /// RocksDB instance
    db: Arc<DB>,
    /// Database path
    path: String,
    /// Write options (sync controlled by configuration)
    write_opts: WriteOptions,
}

impl RocksStore {
    /// Open (or create) a RocksStore at the specified path
    ///
    /// # Arguments
    /// - `path`: Database path
    /// - `sync_writes`: fsync the RocksDB WAL on every batch
    pub fn open<P: AsRef<Path>>(path: P, sync_writes: bool) -> StoreResult<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(64 * 1024 * 1024); // 64MB write buffer
        opts.set_max_write_buffer_number(4);
        opts.set_target_file_size_base(64 * 1024 * 1024); // 64MB SST files
        opts.set_level_zero_file_num_compaction_trigger(4);
        opts.set_max_background_jobs(4);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let db = DB::open(&opts, &path_str)
            .map_err(|e| StoreError::Io(format!("Failed to open RocksDB: {}", e)))?;

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(sync_writes);

        info!("Opened RocksDB store at {} (sync_writes={})", path_str, sync_writes);

        Ok(Self {
            db: Arc::new(db),
            path: path_str,
            write_opts,
        })
    }

    /// Get database path
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl OrderedStore for RocksStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Bytes>> {
        match self.db.get(key) {
            Ok(value) => Ok(value.map(Bytes::from)),
            Err(e) => {
                error!("RocksDB GET error: {}", e);
                Err(StoreError::Internal(format!("RocksDB GET error: {}", e)))
            }
        }
    }

    fn atomic_apply(&self, ops: Vec<WriteOp>) -> StoreResult<()> {
        let mut batch = WriteBatch::default();
        for op in &ops {
            match op {
                WriteOp::Put { key, value } => batch.put(key, value),
                WriteOp::Delete { key } => batch.delete(key),
            }
        }
        self.db.write_opt(batch, &self.write_opts).map_err(|e| {
            error!("RocksDB batch write error ({} ops): {}", ops.len(), e);
            StoreError::Internal(format!("RocksDB WRITE error: {}", e))
        })
    }

    fn scan(
        &self,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        limit: usize,
    ) -> StoreResult<Vec<KvPair>> {
        if limit == 0 || range_is_empty(lower, upper) {
            return Ok(Vec::new());
        }
        let (mode, read_opts) = iterate_range(lower, upper);
        // The iterator pins an implicit snapshot for its whole lifetime
        collect_range(self.db.iterator_opt(mode, read_opts), lower, upper, limit)
    }

    fn snapshot(&self) -> Box<dyn StoreSnapshot + '_> {
        Box::new(RocksSnapshot {
            snapshot: self.db.snapshot(),
        })
    }
}

/// Explicit RocksDB snapshot shared by every read of one command
struct RocksSnapshot<'a> {
    snapshot: Snapshot<'a>,
}

impl StoreSnapshot for RocksSnapshot<'_> {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Bytes>> {
        self.snapshot
            .get(key)
            .map(|value| value.map(Bytes::from))
            .map_err(|e| StoreError::Internal(format!("RocksDB snapshot GET error: {}", e)))
    }

    fn scan(
        &self,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        limit: usize,
    ) -> StoreResult<Vec<KvPair>> {
        if limit == 0 || range_is_empty(lower, upper) {
            return Ok(Vec::new());
        }
        let (mode, read_opts) = iterate_range(lower, upper);
        collect_range(self.snapshot.iterator_opt(mode, read_opts), lower, upper, limit)
    }
}

/// Iterator start and read options for a bounded forward scan
fn iterate_range<'k>(
    lower: Bound<&'k [u8]>,
    upper: Bound<&[u8]>,
) -> (IteratorMode<'k>, ReadOptions) {
    let mut read_opts = ReadOptions::default();
    if let Bound::Excluded(end) = upper {
        read_opts.set_iterate_upper_bound(end.to_vec());
    }
    let mode = match lower {
        Bound::Included(start) | Bound::Excluded(start) => {
            IteratorMode::From(start, Direction::Forward)
        }
        Bound::Unbounded => IteratorMode::Start,
    };
    (mode, read_opts)
}

/// Drain a forward iterator, applying the bounds RocksDB does not enforce
fn collect_range<I>(
    iter: I,
    lower: Bound<&[u8]>,
    upper: Bound<&[u8]>,
    limit: usize,
) -> StoreResult<Vec<KvPair>>
where
    I: Iterator<Item = Result<(Box<[u8]>, Box<[u8]>), rocksdb::Error>>,
{
    let mut result = Vec::new();
    for item in iter {
        let (k, v) =
            item.map_err(|e| StoreError::Internal(format!("RocksDB SCAN error: {}", e)))?;
        if let Bound::Excluded(start) = lower {
            if k.as_ref() == start {
                continue;
            }
        }
        if let Bound::Included(end) = upper {
            if k.as_ref() > end {
                break;
            }
        }
        result.push((Bytes::from(k), Bytes::from(v)));
        if result.len() >= limit {
            break;
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn create_temp_db() -> RocksStore {
        let path = format!("/tmp/hashkv_rocks_store_test_{}", rand::random::<u64>());
        RocksStore::open(path, false).expect("Failed to create test database")
    }

    fn cleanup_db(db: RocksStore) {
        let path = db.path().to_string();
        drop(db);
        let _ = fs::remove_dir_all(&path);
    }

    #[test]
    fn test_point_operations() {
        let db = create_temp_db();
        assert!(db.get(b"k").unwrap().is_none());
        db.put(b"k", b"v").unwrap();
        assert_eq!(db.get(b"k").unwrap(), Some(Bytes::from_static(b"v")));
        db.delete(b"k").unwrap();
        assert!(db.get(b"k").unwrap().is_none());
        cleanup_db(db);
    }

    #[test]
    fn test_scan_bounds() {
        let db = create_temp_db();
        db.atomic_apply(vec![
            WriteOp::put(b"a".to_vec(), b"1".to_vec()),
            WriteOp::put(b"b".to_vec(), b"2".to_vec()),
            WriteOp::put(b"c".to_vec(), b"3".to_vec()),
        ])
        .unwrap();

        let a: &[u8] = b"a";
        let b: &[u8] = b"b";
        let c: &[u8] = b"c";

        let r = db.scan(Bound::Excluded(a), Bound::Unbounded, 10).unwrap();
        assert_eq!(r.len(), 2);
        assert_eq!(r[0].0.as_ref(), b"b");

        let r = db.scan(Bound::Included(a), Bound::Excluded(c), 10).unwrap();
        assert_eq!(r.len(), 2);
        assert_eq!(r[1].0.as_ref(), b"b");

        let r = db.scan(Bound::Included(b), Bound::Included(c), 10).unwrap();
        assert_eq!(r.len(), 2);
        assert_eq!(r[1].1.as_ref(), b"3");

        let r = db.scan(Bound::Unbounded, Bound::Unbounded, 1).unwrap();
        assert_eq!(r.len(), 1);

        assert!(db.scan(Bound::Included(c), Bound::Included(a), 10).unwrap().is_empty());
        cleanup_db(db);
    }

    #[test]
    fn test_snapshot_ignores_later_batches() {
        let db = create_temp_db();
        db.atomic_apply(vec![
            WriteOp::put(b"a".to_vec(), b"1".to_vec()),
            WriteOp::put(b"b".to_vec(), b"1".to_vec()),
        ])
        .unwrap();

        {
            let snapshot = db.snapshot();
            db.atomic_apply(vec![
                WriteOp::put(b"a".to_vec(), b"2".to_vec()),
                WriteOp::delete(b"b".to_vec()),
                WriteOp::put(b"c".to_vec(), b"2".to_vec()),
            ])
            .unwrap();

            assert_eq!(snapshot.get(b"a").unwrap(), Some(Bytes::from_static(b"1")));
            assert_eq!(snapshot.get(b"b").unwrap(), Some(Bytes::from_static(b"1")));
            let a: &[u8] = b"a";
            let rows = snapshot.scan(Bound::Excluded(a), Bound::Unbounded, 10).unwrap();
            assert_eq!(rows, vec![(Bytes::from_static(b"b"), Bytes::from_static(b"1"))]);
        }

        assert_eq!(db.get(b"a").unwrap(), Some(Bytes::from_static(b"2")));
        assert!(db.get(b"b").unwrap().is_none());
        cleanup_db(db);
    }
}
