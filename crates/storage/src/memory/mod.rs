//! Memory storage implementation
//!
//! Volatile `OrderedStore` backed by a `BTreeMap`, used for embedding and
//! tests. Data is lost on restart.

mod store;

pub use store::MemoryStore;
