//! BTreeMap-based ordered store
//!
//! Lock Strategy:
//! - `get` / `scan`: read lock, so a scan sees one point-in-time view
//! - `snapshot`: read lock held until the snapshot is dropped
//! - `atomic_apply`: write lock held for the whole batch

use crate::traits::{range_is_empty, KvPair, OrderedStore, StoreResult, StoreSnapshot, WriteOp};
use bytes::Bytes;
use parking_lot::{RwLock, RwLockReadGuard};
use std::collections::BTreeMap;
use std::ops::Bound;

/// In-memory ordered store
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<Vec<u8>, Bytes>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys (all tags)
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl OrderedStore for MemoryStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Bytes>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn atomic_apply(&self, ops: Vec<WriteOp>) -> StoreResult<()> {
        let mut data = self.data.write();
        for op in ops {
            match op {
                WriteOp::Put { key, value } => {
                    data.insert(key, Bytes::from(value));
                }
                WriteOp::Delete { key } => {
                    data.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn scan(
        &self,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        limit: usize,
    ) -> StoreResult<Vec<KvPair>> {
        Ok(range_of(&self.data.read(), lower, upper, limit))
    }

    fn snapshot(&self) -> Box<dyn StoreSnapshot + '_> {
        Box::new(MemorySnapshot {
            data: self.data.read(),
        })
    }
}

/// Read guard over the whole map
struct MemorySnapshot<'a> {
    data: RwLockReadGuard<'a, BTreeMap<Vec<u8>, Bytes>>,
}

impl StoreSnapshot for MemorySnapshot<'_> {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Bytes>> {
        Ok(self.data.get(key).cloned())
    }

    fn scan(
        &self,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        limit: usize,
    ) -> StoreResult<Vec<KvPair>> {
        Ok(range_of(&self.data, lower, upper, limit))
    }
}

fn range_of(
    data: &BTreeMap<Vec<u8>, Bytes>,
    lower: Bound<&[u8]>,
    upper: Bound<&[u8]>,
    limit: usize,
) -> Vec<KvPair> {
    // BTreeMap::range panics on inverted bounds
    if limit == 0 || range_is_empty(lower, upper) {
        return Vec::new();
    }
    data.range::<[u8], _>((lower, upper))
        .take(limit)
        .map(|(k, v)| (Bytes::copy_from_slice(k), v.clone()))
        .collect()
}
