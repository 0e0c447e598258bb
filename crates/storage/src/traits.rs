//! Ordered store trait definitions
//!
//! The hash engine reaches persistent state only through [`OrderedStore`]:
//!
//! - `get`: point lookup
//! - `put` / `delete`: single-key writes
//! - `atomic_apply`: all-or-nothing batch of puts and deletes
//! - `scan`: ascending range scan, restartable from an explicit key bound
//! - `snapshot`: point-in-time view for reads spanning several calls
//!
//! Backends: `RocksStore` (persistent) and `MemoryStore` (volatile).

use bytes::Bytes;
use std::ops::Bound;
use std::sync::Arc;

// ============================================================================
// Error Types
// ============================================================================

/// Store backend error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Filesystem or engine I/O failure
    Io(String),
    /// Backend reported corrupted data
    Corruption(String),
    /// Any other backend failure
    Internal(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(msg) => write!(f, "io error: {}", msg),
            StoreError::Corruption(msg) => write!(f, "corruption: {}", msg),
            StoreError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

pub type StoreResult<T> = Result<T, StoreError>;

/// Key-value pair returned by scans
pub type KvPair = (Bytes, Bytes);

// ============================================================================
// Write Operations
// ============================================================================

/// Single operation inside an atomic batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl WriteOp {
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        WriteOp::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        WriteOp::Delete { key: key.into() }
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Consistent read-only view of the store
///
/// Every call observes the same committed state: a batch applied after the
/// snapshot was taken is invisible, a batch applied before is fully visible.
pub trait StoreSnapshot {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Bytes>>;

    fn scan(&self, lower: Bound<&[u8]>, upper: Bound<&[u8]>, limit: usize)
        -> StoreResult<Vec<KvPair>>;
}

// ============================================================================
// Ordered Store Trait
// ============================================================================

/// Flat ordered byte-string store
///
/// This is the only durability boundary: nothing above it persists state
/// directly.
pub trait OrderedStore: Send + Sync {
    /// Point lookup, `None` when the key is absent
    fn get(&self, key: &[u8]) -> StoreResult<Option<Bytes>>;

    /// Write a single key
    fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.atomic_apply(vec![WriteOp::put(key, value)])
    }

    /// Remove a single key (no-op when absent)
    fn delete(&self, key: &[u8]) -> StoreResult<()> {
        self.atomic_apply(vec![WriteOp::delete(key)])
    }

    /// Apply all operations or none of them
    ///
    /// Operations apply in order; a later operation on the same key wins.
    /// Concurrent readers never observe a prefix of the batch.
    fn atomic_apply(&self, ops: Vec<WriteOp>) -> StoreResult<()>;

    /// Ascending scan of keys within `(lower, upper)`, at most `limit` pairs
    ///
    /// An empty or inverted range yields an empty result.
    fn scan(&self, lower: Bound<&[u8]>, upper: Bound<&[u8]>, limit: usize)
        -> StoreResult<Vec<KvPair>>;

    /// Take a point-in-time view
    ///
    /// The view may block writers until it is dropped (`MemoryStore`), so it
    /// must not outlive the read it serves or be held across a write.
    fn snapshot(&self) -> Box<dyn StoreSnapshot + '_>;
}

impl<T: OrderedStore + ?Sized> OrderedStore for Arc<T> {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Bytes>> {
        (**self).get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        (**self).put(key, value)
    }

    fn delete(&self, key: &[u8]) -> StoreResult<()> {
        (**self).delete(key)
    }

    fn atomic_apply(&self, ops: Vec<WriteOp>) -> StoreResult<()> {
        (**self).atomic_apply(ops)
    }

    fn scan(
        &self,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        limit: usize,
    ) -> StoreResult<Vec<KvPair>> {
        (**self).scan(lower, upper, limit)
    }

    fn snapshot(&self) -> Box<dyn StoreSnapshot + '_> {
        (**self).snapshot()
    }
}

/// True when no key can satisfy both bounds
pub(crate) fn range_is_empty(lower: Bound<&[u8]>, upper: Bound<&[u8]>) -> bool {
    match (lower, upper) {
        (Bound::Included(l), Bound::Included(u)) => l > u,
        (Bound::Included(l), Bound::Excluded(u))
        | (Bound::Excluded(l), Bound::Included(u))
        | (Bound::Excluded(l), Bound::Excluded(u)) => l >= u,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_is_empty() {
        let a: &[u8] = b"a";
        let b: &[u8] = b"b";
        assert!(!range_is_empty(Bound::Included(a), Bound::Included(a)));
        assert!(range_is_empty(Bound::Included(a), Bound::Excluded(a)));
        assert!(range_is_empty(Bound::Excluded(a), Bound::Included(a)));
        assert!(range_is_empty(Bound::Included(b), Bound::Included(a)));
        assert!(!range_is_empty(Bound::Unbounded, Bound::Excluded(a)));
        assert!(!range_is_empty(Bound::Excluded(a), Bound::Unbounded));
    }
}
