//! Hash containers over a flat ordered key-value store
//!
//! Maps `name -> field -> value` onto byte-string rows, keeps an exact field
//! count per name, rejects names bound to another container kind and writes
//! one binlog record per mutated field in the same atomic batch as the data.
//!
//! ## Module Structure
//!
//! - `key_encoding.rs`: Key tags and key encoding/decoding
//! - `traits.rs`: `OrderedStore` contract consumed by the engine
//! - `rocksdb/`: Persistent RocksDB backend
//! - `memory/`: In-memory BTreeMap backend
//! - `batch.rs`: Write batch staged by one request
//! - `binlog.rs`: Sequence assignment, commit and replication log queries
//! - `hash/`: Size counters, mutations and scans
//! - `config.rs`: YAML storage configuration

pub mod batch;
pub mod binlog;
pub mod config;
pub mod error;
pub mod hash;
pub mod key_encoding;
pub mod memory;
pub mod outcome;
pub mod rocksdb;
pub mod traits;

pub use crate::batch::Batch;
pub use crate::binlog::{Binlog, BinlogRecord, CommandKind, ReplicationKind};
pub use crate::config::{Backend, BinlogConfig, ConfigError, StorageConfig};
pub use crate::error::{HashError, HashResult};
pub use crate::hash::{format_decimal, glob_match, HashEngine, ScanPage};
pub use crate::key_encoding::{ContainerKind, DecodeError, KeyTag, MAX_NAME_LEN};
pub use crate::memory::MemoryStore;
pub use crate::outcome::{tri_state, Presence};
pub use crate::rocksdb::RocksStore;
pub use crate::traits::{KvPair, OrderedStore, StoreError, StoreResult, StoreSnapshot, WriteOp};
