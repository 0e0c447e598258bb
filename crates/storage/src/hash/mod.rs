//! Hash container engine
//!
//! Provides Redis/SSDB-compatible hash operations over an `OrderedStore`:
//! - HSET, HSETNX, HMSET, HDEL, HINCR, HINCRBYFLOAT, HCLEAR (`write.rs`)
//! - HGET, HEXISTS, HSIZE, HGETALL, HMGET, HKEYS, HVALS, HSCAN (`read.rs`)
//!
//! ## Lock Strategy
//!
//! - Writes: the name's stripe lock is held from the first read to the
//!   commit, so read-decide-write sequences on one name never interleave
//! - Reads: no lock; each command reads through one store snapshot
//! - Commit: `Binlog::commit` serializes sequence assignment with the apply
//!
//! Lock order is always stripe, then binlog.

mod counter;
mod glob;
mod read;
mod write;

pub use counter::SizeCounter;
pub use glob::glob_match;
pub use read::ScanPage;
pub use write::format_decimal;

use crate::binlog::Binlog;
use crate::config::{Backend, StorageConfig};
use crate::error::{HashError, HashResult};
use crate::key_encoding::MAX_NAME_LEN;
use crate::memory::MemoryStore;
use crate::rocksdb::RocksStore;
use crate::traits::{OrderedStore, StoreError};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tracing::info;

/// Striped per-name write locks
///
/// Names hash to a fixed set of mutexes; two names may share a stripe, which
/// only costs concurrency, never correctness.
pub(crate) struct KeyLocks {
    stripes: Vec<Mutex<()>>,
}

impl KeyLocks {
    pub(crate) fn new(count: usize) -> Self {
        Self {
            stripes: (0..count.max(1)).map(|_| Mutex::new(())).collect(),
        }
    }

    pub(crate) fn lock(&self, name: &[u8]) -> MutexGuard<'_, ()> {
        let index = crc32fast::hash(name) as usize % self.stripes.len();
        self.stripes[index].lock()
    }
}

/// Hash engine over an ordered store
pub struct HashEngine<S: OrderedStore + ?Sized> {
    store: Arc<S>,
    counters: SizeCounter<S>,
    binlog: Binlog<S>,
    locks: KeyLocks,
}

impl<S: OrderedStore + ?Sized> HashEngine<S> {
    /// Create an engine over an already opened store
    pub fn new(store: Arc<S>, config: &StorageConfig) -> HashResult<Self> {
        let binlog = Binlog::open(store.clone(), config.binlog.clone())?;
        Ok(Self {
            counters: SizeCounter::new(store.clone()),
            store,
            binlog,
            locks: KeyLocks::new(config.lock_stripes),
        })
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Replication log
    pub fn binlog(&self) -> &Binlog<S> {
        &self.binlog
    }

    /// Size counter manager (cross-kind type lookup included)
    pub fn counters(&self) -> &SizeCounter<S> {
        &self.counters
    }
}

impl HashEngine<dyn OrderedStore> {
    /// Open the configured backend and build an engine over it
    pub fn open(config: &StorageConfig) -> HashResult<Self> {
        let store: Arc<dyn OrderedStore> = match config.backend {
            Backend::Rocksdb => {
                let path = config.rocksdb_path();
                std::fs::create_dir_all(&path).map_err(|e| {
                    StoreError::Io(format!("Failed to create data directory {:?}: {}", path, e))
                })?;
                Arc::new(RocksStore::open(&path, config.sync_writes)?) as Arc<dyn OrderedStore>
            }
            Backend::Memory => Arc::new(MemoryStore::new()) as Arc<dyn OrderedStore>,
        };
        info!("Hash engine opened with {:?} backend", config.backend);
        Self::new(store, config)
    }
}

/// Reject names that do not fit the key length prefix
pub(crate) fn check_name(name: &[u8]) -> HashResult<()> {
    if name.len() > MAX_NAME_LEN {
        return Err(HashError::NameTooLong(name.len()));
    }
    Ok(())
}
