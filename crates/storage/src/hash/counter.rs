//! Hash size counters and cross-kind type lookup
//!
//! The counter row `H{len}{name}` holds the exact number of field rows of a
//! hash as a decimal string. It is only ever changed inside the batch that
//! changes the field rows, and it doubles as the row binding `name` to the
//! hash kind: deleting it at zero frees the name for any kind.

use crate::batch::Batch;
use crate::error::{HashError, HashResult};
use crate::key_encoding::{encode_counter_key, encode_marker_key, ContainerKind, DecodeError};
use crate::traits::{OrderedStore, StoreResult, StoreSnapshot};
use bytes::Bytes;
use std::sync::Arc;
use tracing::debug;

/// Size counter manager
pub struct SizeCounter<S: OrderedStore + ?Sized> {
    store: Arc<S>,
}

impl<S: OrderedStore + ?Sized> SizeCounter<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Current field count, 0 when the hash does not exist
    pub fn get_count(&self, name: &[u8]) -> HashResult<u64> {
        match self.store.get(&encode_counter_key(name))? {
            Some(raw) => parse_count(&raw),
            None => Ok(0),
        }
    }

    /// Kind currently bound to `name`, if any
    ///
    /// Checks the marker row of every kind, hash first.
    pub fn resolve_kind(&self, name: &[u8]) -> HashResult<Option<ContainerKind>> {
        for kind in ContainerKind::ALL {
            if self.store.get(&encode_marker_key(kind, name))?.is_some() {
                return Ok(Some(kind));
            }
        }
        Ok(None)
    }

    /// Fail with `WrongType` unless `name` is unbound or a hash
    ///
    /// Returns the current field count.
    pub fn check_hash(&self, name: &[u8]) -> HashResult<u64> {
        check_hash_with(|key| self.store.get(key), name)
    }

    /// `check_hash` against a snapshot, so later reads of the same view agree
    pub fn check_hash_in(&self, snapshot: &dyn StoreSnapshot, name: &[u8]) -> HashResult<u64> {
        check_hash_with(|key| snapshot.get(key), name)
    }

    /// Stage the counter change for `current + delta` into `batch`
    ///
    /// Must be called with the name's write lock held and `current` read under
    /// that lock. A result of zero or less deletes the counter (the hash
    /// disappears); a positive result from zero creates it.
    pub fn apply_delta(&self, batch: &mut Batch, name: &[u8], current: u64, delta: i64) -> u64 {
        let new_count = (current as i64).saturating_add(delta);
        if new_count <= 0 {
            if current > 0 {
                batch.delete(encode_counter_key(name));
            }
            return 0;
        }
        let new_count = new_count as u64;
        if new_count != current {
            batch.put(encode_counter_key(name), new_count.to_string().into_bytes());
        }
        new_count
    }
}

fn check_hash_with<G>(get: G, name: &[u8]) -> HashResult<u64>
where
    G: Fn(&[u8]) -> StoreResult<Option<Bytes>>,
{
    if let Some(raw) = get(&encode_counter_key(name))? {
        return parse_count(&raw);
    }
    // Not a hash: any other marker means the name is taken
    for kind in ContainerKind::ALL {
        if kind == ContainerKind::Hash {
            continue;
        }
        if get(&encode_marker_key(kind, name))?.is_some() {
            debug!(
                "{:?} is a {}, not a hash",
                String::from_utf8_lossy(name),
                kind.type_name()
            );
            return Err(HashError::WrongType);
        }
    }
    Ok(0)
}

fn parse_count(raw: &[u8]) -> HashResult<u64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| DecodeError::InvalidCounter(String::from_utf8_lossy(raw).into_owned()).into())
}
