//! Hash read and enumeration operations
//!
//! HGET, HEXISTS, HSIZE, HGETALL, HMGET, HKEYS, HVALS, HSCAN.
//! Reads take no lock. Each command runs its type check and every get or
//! scan against one store snapshot, so it never sees part of a batch.

use super::{check_name, glob_match, HashEngine};
use crate::error::{HashError, HashResult};
use crate::key_encoding::{
    decode_field_key, encode_field_key, encode_field_prefix, prefix_successor, DecodeError,
};
use crate::traits::{OrderedStore, StoreSnapshot};
use bytes::Bytes;
use std::collections::BTreeSet;
use std::ops::Bound;
use tracing::warn;

/// Rows fetched from the store per scan round trip
const SCAN_CHUNK: usize = 128;

/// One page of an HSCAN
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Matching `(field, value)` pairs in ascending field order
    pub pairs: Vec<(Bytes, Bytes)>,
    /// Last field examined; `None` once the container is exhausted
    pub cursor: Option<Bytes>,
}

impl<S: OrderedStore + ?Sized> HashEngine<S> {
    /// HGET
    pub fn hget(&self, name: &[u8], field: &[u8]) -> HashResult<Option<Bytes>> {
        check_name(name)?;
        let snapshot = self.store.snapshot();
        if self.counters.check_hash_in(&*snapshot, name)? == 0 {
            return Ok(None);
        }
        Ok(snapshot.get(&encode_field_key(name, field))?)
    }

    /// HEXISTS
    pub fn hexists(&self, name: &[u8], field: &[u8]) -> HashResult<bool> {
        Ok(self.hget(name, field)?.is_some())
    }

    /// HSIZE: number of fields, 0 for an absent hash
    pub fn hsize(&self, name: &[u8]) -> HashResult<u64> {
        check_name(name)?;
        self.counters.check_hash(name)
    }

    /// HGETALL
    pub fn hgetall(&self, name: &[u8]) -> HashResult<Vec<(Bytes, Bytes)>> {
        self.hrange(name, b"", b"", usize::MAX)
    }

    /// HMGET: present fields only, each once, in ascending field order
    pub fn hmget<F: AsRef<[u8]>>(
        &self,
        name: &[u8],
        fields: &[F],
    ) -> HashResult<Vec<(Bytes, Bytes)>> {
        check_name(name)?;
        let snapshot = self.store.snapshot();
        if self.counters.check_hash_in(&*snapshot, name)? == 0 {
            return Ok(Vec::new());
        }

        let fields: BTreeSet<&[u8]> = fields.iter().map(|f| f.as_ref()).collect();
        let mut pairs = Vec::with_capacity(fields.len());
        for field in fields {
            if let Some(value) = snapshot.get(&encode_field_key(name, field))? {
                pairs.push((Bytes::copy_from_slice(field), value));
            }
        }
        Ok(pairs)
    }

    /// Fields in `(start, end]`, at most `limit` pairs
    ///
    /// An empty `start` or `end` leaves that side unbounded.
    pub fn hrange(
        &self,
        name: &[u8],
        start: &[u8],
        end: &[u8],
        limit: usize,
    ) -> HashResult<Vec<(Bytes, Bytes)>> {
        check_name(name)?;
        let snapshot = self.store.snapshot();
        if self.counters.check_hash_in(&*snapshot, name)? == 0 {
            return Ok(Vec::new());
        }
        let lower = if start.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Excluded(start)
        };
        let upper = if end.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Included(end)
        };
        scan_fields(&*snapshot, name, lower, upper, limit)
    }

    /// HKEYS over `(start, end]`
    pub fn hkeys(
        &self,
        name: &[u8],
        start: &[u8],
        end: &[u8],
        limit: usize,
    ) -> HashResult<Vec<Bytes>> {
        Ok(self
            .hrange(name, start, end, limit)?
            .into_iter()
            .map(|(field, _)| field)
            .collect())
    }

    /// HVALS over `(start, end]`, in field order
    pub fn hvals(
        &self,
        name: &[u8],
        start: &[u8],
        end: &[u8],
        limit: usize,
    ) -> HashResult<Vec<Bytes>> {
        Ok(self
            .hrange(name, start, end, limit)?
            .into_iter()
            .map(|(_, value)| value)
            .collect())
    }

    /// HSCAN with a numeric cursor token
    ///
    /// The cursor must be a non-empty run of ASCII digits fitting `u64`. Zero
    /// starts from the first field; any other token is the field to resume
    /// strictly after.
    pub fn hscan(
        &self,
        name: &[u8],
        cursor: &[u8],
        pattern: &[u8],
        limit: usize,
    ) -> HashResult<ScanPage> {
        let value = parse_cursor(cursor)?;
        let after = if value == 0 { None } else { Some(cursor) };
        self.hscan_after(name, after, pattern, limit)
    }

    /// HSCAN resuming strictly after the field `after` (from the start on `None`)
    ///
    /// Stops after `limit` fields matching the glob `pattern`.
    pub fn hscan_after(
        &self,
        name: &[u8],
        after: Option<&[u8]>,
        pattern: &[u8],
        limit: usize,
    ) -> HashResult<ScanPage> {
        check_name(name)?;
        if limit == 0 {
            return Err(HashError::Syntax("scan limit must be positive".to_string()));
        }
        let mut page = ScanPage::default();
        // One view for every chunk of the page
        let snapshot = self.store.snapshot();
        if self.counters.check_hash_in(&*snapshot, name)? == 0 {
            return Ok(page);
        }

        let mut last: Option<Bytes> = after.map(Bytes::copy_from_slice);
        loop {
            let lower = match &last {
                Some(field) => Bound::Excluded(field.as_ref()),
                None => Bound::Unbounded,
            };
            let chunk = scan_fields(&*snapshot, name, lower, Bound::Unbounded, SCAN_CHUNK)?;
            let exhausted = chunk.len() < SCAN_CHUNK;

            for (field, value) in chunk {
                last = Some(field.clone());
                if glob_match(pattern, &field) {
                    page.pairs.push((field, value));
                    if page.pairs.len() == limit {
                        page.cursor = last;
                        return Ok(page);
                    }
                }
            }
            if exhausted {
                return Ok(page);
            }
        }
    }
}

/// Scan field rows of `name` between field bounds in `snapshot`
///
/// Returns `(field, value)` pairs; every key read back is re-decoded and
/// must belong to `name`.
pub(super) fn scan_fields(
    snapshot: &dyn StoreSnapshot,
    name: &[u8],
    lower: Bound<&[u8]>,
    upper: Bound<&[u8]>,
    limit: usize,
) -> HashResult<Vec<(Bytes, Bytes)>> {
    let prefix = encode_field_prefix(name);
    let with_prefix = |field: &[u8]| {
        let mut key = prefix.clone();
        key.extend_from_slice(field);
        key
    };

    let lower_key = match lower {
        Bound::Included(f) => Bound::Included(with_prefix(f)),
        Bound::Excluded(f) => Bound::Excluded(with_prefix(f)),
        Bound::Unbounded => Bound::Included(prefix.clone()),
    };
    let upper_key = match upper {
        Bound::Included(f) => Bound::Included(with_prefix(f)),
        Bound::Excluded(f) => Bound::Excluded(with_prefix(f)),
        Bound::Unbounded => match prefix_successor(&prefix) {
            Some(end) => Bound::Excluded(end),
            None => Bound::Unbounded,
        },
    };

    let rows = snapshot.scan(
        lower_key.as_ref().map(Vec::as_slice),
        upper_key.as_ref().map(Vec::as_slice),
        limit,
    )?;

    let mut pairs = Vec::with_capacity(rows.len());
    for (key, value) in rows {
        let decoded = decode_field_key(&key)?;
        if decoded.name != name {
            warn!(
                "Field row {:?} found while scanning hash {:?}",
                String::from_utf8_lossy(&key),
                String::from_utf8_lossy(name)
            );
            return Err(DecodeError::ForeignName.into());
        }
        let field = key.slice(prefix.len()..);
        pairs.push((field, value));
    }
    Ok(pairs)
}

fn parse_cursor(cursor: &[u8]) -> HashResult<u64> {
    if cursor.is_empty() || !cursor.iter().all(u8::is_ascii_digit) {
        return Err(HashError::InvalidInt);
    }
    std::str::from_utf8(cursor)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or(HashError::InvalidInt)
}
