//! RocksDB-based persistent storage implementation
//!
//! All rows live in the default Column Family; the key tag (see
//! `key_encoding.rs`) separates hash fields, size counters, other container
//! kinds and binlog records.
//!
//! ## Features
//! - Persistent storage with WAL
//! - Atomic multi-key commits through `WriteBatch`
//! - Bounded forward iteration for range scans

mod store;

pub use store::RocksStore;
