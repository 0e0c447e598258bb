//! Hash mutation operations
//!
//! HSET, HSETNX, HMSET, HDEL, HINCR, HINCRBYFLOAT, HCLEAR.
//!
//! Every operation runs under the name's stripe lock: type check, read the
//! targeted fields, stage field rows + counter + binlog records into one
//! `Batch`, and commit it through the binlog in a single `atomic_apply`.

use super::read::scan_fields;
use super::{check_name, HashEngine};
use crate::batch::Batch;
use crate::binlog::CommandKind;
use crate::error::{HashError, HashResult};
use crate::key_encoding::encode_field_key;
use crate::traits::OrderedStore;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use tracing::{debug, warn};

/// Rows deleted per scan round trip in HCLEAR
const CLEAR_CHUNK: usize = 1024;

impl<S: OrderedStore + ?Sized> HashEngine<S> {
    /// HSET: `true` if the field was created, `false` if overwritten
    pub fn hset(&self, name: &[u8], field: &[u8], value: &[u8]) -> HashResult<bool> {
        check_name(name)?;
        let _guard = self.locks.lock(name);
        let count = self.counters.check_hash(name)?;

        let key = encode_field_key(name, field);
        let old = self.store.get(&key)?;
        let created = old.is_none();

        let mut batch = Batch::new();
        if old.as_deref() != Some(value) {
            self.stage_set(&mut batch, key, value);
        }
        if created {
            self.counters.apply_delta(&mut batch, name, count, 1);
        }
        let seq = self.binlog.commit(batch)?;
        debug!("HSET {:?}: created={}, seq={}", String::from_utf8_lossy(name), created, seq);
        Ok(created)
    }

    /// HSETNX: set only if the field does not exist
    pub fn hsetnx(&self, name: &[u8], field: &[u8], value: &[u8]) -> HashResult<bool> {
        check_name(name)?;
        let _guard = self.locks.lock(name);
        let count = self.counters.check_hash(name)?;

        let key = encode_field_key(name, field);
        if self.store.get(&key)?.is_some() {
            return Ok(false);
        }

        let mut batch = Batch::new();
        self.stage_set(&mut batch, key, value);
        self.counters.apply_delta(&mut batch, name, count, 1);
        self.binlog.commit(batch)?;
        Ok(true)
    }

    /// HMSET: returns the number of distinct fields in the request
    ///
    /// A field given twice keeps its last value and counts once.
    pub fn hmset<F: AsRef<[u8]>, V: AsRef<[u8]>>(
        &self,
        name: &[u8],
        pairs: &[(F, V)],
    ) -> HashResult<u64> {
        check_name(name)?;
        if pairs.is_empty() {
            return Err(HashError::Syntax("hmset needs at least one field".to_string()));
        }
        let fields: BTreeMap<&[u8], &[u8]> = pairs
            .iter()
            .map(|(f, v)| (f.as_ref(), v.as_ref()))
            .collect();

        let _guard = self.locks.lock(name);
        let count = self.counters.check_hash(name)?;

        let mut batch = Batch::new();
        let mut created = 0i64;
        for (&field, &value) in &fields {
            let key = encode_field_key(name, field);
            let old = self.store.get(&key)?;
            if old.is_none() {
                created += 1;
            }
            if old.as_deref() != Some(value) {
                self.stage_set(&mut batch, key, value);
            }
        }
        self.counters.apply_delta(&mut batch, name, count, created);
        let seq = self.binlog.commit(batch)?;
        debug!(
            "HMSET {:?}: {} fields, {} created, seq={}",
            String::from_utf8_lossy(name),
            fields.len(),
            created,
            seq
        );
        Ok(fields.len() as u64)
    }

    /// HMSET from a flat `field value field value ...` argument list
    pub fn hmset_args(&self, name: &[u8], args: &[Bytes]) -> HashResult<u64> {
        if args.is_empty() || args.len() % 2 != 0 {
            return Err(HashError::Syntax(format!(
                "hmset expects field/value pairs, got {} arguments",
                args.len()
            )));
        }
        let pairs: Vec<(&[u8], &[u8])> = args
            .chunks_exact(2)
            .map(|pair| (pair[0].as_ref(), pair[1].as_ref()))
            .collect();
        self.hmset(name, &pairs)
    }

    /// HDEL: number of the given fields that existed before the call
    pub fn hdel<F: AsRef<[u8]>>(&self, name: &[u8], fields: &[F]) -> HashResult<u64> {
        check_name(name)?;
        let fields: BTreeSet<&[u8]> = fields.iter().map(|f| f.as_ref()).collect();

        let _guard = self.locks.lock(name);
        let count = self.counters.check_hash(name)?;
        if count == 0 {
            return Ok(0);
        }

        let mut batch = Batch::new();
        let mut removed = 0u64;
        for field in fields {
            let key = encode_field_key(name, field);
            if self.store.get(&key)?.is_some() {
                self.stage_delete(&mut batch, key);
                removed += 1;
            }
        }
        self.counters
            .apply_delta(&mut batch, name, count, -(removed as i64));
        let seq = self.binlog.commit(batch)?;
        debug!("HDEL {:?}: removed={}, seq={}", String::from_utf8_lossy(name), removed, seq);
        Ok(removed)
    }

    /// HINCR: add `delta` to an integer field (absent counts as 0)
    ///
    /// Overflow and underflow are rejected before anything is written.
    pub fn hincr(&self, name: &[u8], field: &[u8], delta: i64) -> HashResult<i64> {
        check_name(name)?;
        let _guard = self.locks.lock(name);
        let count = self.counters.check_hash(name)?;

        let key = encode_field_key(name, field);
        let old = self.store.get(&key)?;
        let current = match &old {
            Some(raw) => parse_int(raw)?,
            None => 0,
        };
        let new_value = current.checked_add(delta).ok_or(if delta > 0 {
            HashError::Overflow
        } else {
            HashError::Underflow
        })?;

        let encoded = new_value.to_string();
        let mut batch = Batch::new();
        if old.as_deref() != Some(encoded.as_bytes()) {
            self.stage_set(&mut batch, key, encoded.as_bytes());
        }
        if old.is_none() {
            self.counters.apply_delta(&mut batch, name, count, 1);
        }
        self.binlog.commit(batch)?;
        Ok(new_value)
    }

    /// HINCRBYFLOAT: add `delta` to a decimal field (absent counts as 0)
    ///
    /// Returns the stored value formatted by [`format_decimal`].
    pub fn hincrbyfloat(&self, name: &[u8], field: &[u8], delta: f64) -> HashResult<String> {
        check_name(name)?;
        if !delta.is_finite() {
            return Err(HashError::InvalidFloat);
        }
        let _guard = self.locks.lock(name);
        let count = self.counters.check_hash(name)?;

        let key = encode_field_key(name, field);
        let old = self.store.get(&key)?;
        let current = match &old {
            Some(raw) => parse_float(raw)?,
            None => 0.0,
        };
        let new_value = current + delta;
        if !new_value.is_finite() {
            return Err(HashError::Overflow);
        }

        let encoded = format_decimal(new_value);
        let mut batch = Batch::new();
        if old.as_deref() != Some(encoded.as_bytes()) {
            self.stage_set(&mut batch, key, encoded.as_bytes());
        }
        if old.is_none() {
            self.counters.apply_delta(&mut batch, name, count, 1);
        }
        self.binlog.commit(batch)?;
        Ok(encoded)
    }

    /// HCLEAR: delete every field; returns how many were removed
    pub fn hclear(&self, name: &[u8]) -> HashResult<u64> {
        check_name(name)?;
        let _guard = self.locks.lock(name);
        let count = self.counters.check_hash(name)?;
        if count == 0 {
            return Ok(0);
        }

        let mut batch = Batch::new();
        let mut removed = 0u64;
        {
            // Dropped before the commit: a memory snapshot blocks writers
            let snapshot = self.store.snapshot();
            let mut last: Option<Bytes> = None;
            loop {
                let lower = match &last {
                    Some(field) => Bound::Excluded(field.as_ref()),
                    None => Bound::Unbounded,
                };
                let chunk = scan_fields(&*snapshot, name, lower, Bound::Unbounded, CLEAR_CHUNK)?;
                let exhausted = chunk.len() < CLEAR_CHUNK;
                for (field, _) in chunk {
                    self.stage_delete(&mut batch, encode_field_key(name, &field));
                    removed += 1;
                    last = Some(field);
                }
                if exhausted {
                    break;
                }
            }
        }

        if removed != count {
            warn!(
                "Hash {:?} counter says {} fields, found {}",
                String::from_utf8_lossy(name),
                count,
                removed
            );
        }
        self.counters
            .apply_delta(&mut batch, name, count, -(count as i64));
        let seq = self.binlog.commit(batch)?;
        debug!("HCLEAR {:?}: removed={}, seq={}", String::from_utf8_lossy(name), removed, seq);
        Ok(removed)
    }

    fn stage_set(&self, batch: &mut Batch, key: Vec<u8>, value: &[u8]) {
        batch.put(key.clone(), value.to_vec());
        batch.append(self.binlog.kind(), CommandKind::HSet, key, value.to_vec());
    }

    fn stage_delete(&self, batch: &mut Batch, key: Vec<u8>) {
        batch.delete(key.clone());
        batch.append(self.binlog.kind(), CommandKind::HDel, key, Vec::new());
    }
}

/// Render a float with at most 15 fractional digits
///
/// Trailing zeros are trimmed, then a trailing `.`; negative zero renders as
/// `0`.
pub fn format_decimal(value: f64) -> String {
    let mut text = format!("{:.15}", value);
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed);
    }
    if text == "-0" {
        text = "0".to_string();
    }
    text
}

fn parse_int(raw: &[u8]) -> HashResult<i64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(HashError::InvalidInt)
}

fn parse_float(raw: &[u8]) -> HashResult<f64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .ok_or(HashError::InvalidFloat)
}

#[cfg(test)]
mod tests {
    use super::super::test_util::{bind_kind, memory_engine};
    use super::*;
    use crate::binlog::BinlogRecord;
    use crate::key_encoding::ContainerKind;
    use crate::memory::MemoryStore;

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    fn records(engine: &HashEngine<MemoryStore>) -> Vec<BinlogRecord> {
        engine.binlog().records_after(0, usize::MAX).unwrap()
    }

    #[test]
    fn test_hset_hget_hsize() {
        let engine = memory_engine();
        assert!(engine.hset(b"h", b"f", b"v1").unwrap());
        assert_eq!(engine.hget(b"h", b"f").unwrap(), Some(b("v1")));
        assert_eq!(engine.hsize(b"h").unwrap(), 1);

        assert!(!engine.hset(b"h", b"f", b"v2").unwrap());
        assert_eq!(engine.hget(b"h", b"f").unwrap(), Some(b("v2")));
        assert_eq!(engine.hsize(b"h").unwrap(), 1);

        assert!(engine.hset(b"h", b"g", b"").unwrap());
        assert_eq!(engine.hget(b"h", b"g").unwrap(), Some(b("")));
        assert_eq!(engine.hsize(b"h").unwrap(), 2);
    }

    #[test]
    fn test_hset_identical_value_writes_nothing() {
        let engine = memory_engine();
        engine.hset(b"h", b"f", b"v").unwrap();
        let seq = engine.binlog().last_seq();
        assert!(!engine.hset(b"h", b"f", b"v").unwrap());
        assert_eq!(engine.binlog().last_seq(), seq);
    }

    #[test]
    fn test_hsetnx() {
        let engine = memory_engine();
        assert!(engine.hsetnx(b"h", b"f", b"1").unwrap());
        assert!(!engine.hsetnx(b"h", b"f", b"2").unwrap());
        assert_eq!(engine.hget(b"h", b"f").unwrap(), Some(b("1")));
        assert_eq!(engine.hsize(b"h").unwrap(), 1);
    }

    #[test]
    fn test_hmset_duplicate_field_collapses() {
        let engine = memory_engine();
        let pairs: [(&[u8], &[u8]); 2] = [(b"f", b"1"), (b"f", b"2")];
        assert_eq!(engine.hmset(b"k", &pairs).unwrap(), 1);
        assert_eq!(engine.hget(b"k", b"f").unwrap(), Some(b("2")));
        assert_eq!(engine.hsize(b"k").unwrap(), 1);
        assert_eq!(records(&engine).len(), 1);
    }

    #[test]
    fn test_hmset_counts_only_created_in_size() {
        let engine = memory_engine();
        engine.hset(b"h", b"a", b"0").unwrap();
        let pairs = [("a", "1"), ("b", "2"), ("c", "3")];
        assert_eq!(engine.hmset(b"h", &pairs).unwrap(), 3);
        assert_eq!(engine.hsize(b"h").unwrap(), 3);
        assert_eq!(engine.hget(b"h", b"a").unwrap(), Some(b("1")));
    }

    #[test]
    fn test_hmset_args() {
        let engine = memory_engine();
        let args = vec![b("a"), b("1"), b("b"), b("2")];
        assert_eq!(engine.hmset_args(b"h", &args).unwrap(), 2);
        assert_eq!(engine.hsize(b"h").unwrap(), 2);

        let odd = vec![b("a"), b("1"), b("b")];
        assert!(matches!(engine.hmset_args(b"h", &odd), Err(HashError::Syntax(_))));
        assert!(matches!(engine.hmset_args(b"h", &[]), Err(HashError::Syntax(_))));
        let empty: [(&[u8], &[u8]); 0] = [];
        assert!(matches!(engine.hmset(b"h", &empty), Err(HashError::Syntax(_))));
        assert_eq!(engine.hsize(b"h").unwrap(), 2);
    }

    #[test]
    fn test_hdel_exact_counts() {
        let engine = memory_engine();
        for f in ["a", "b", "c"] {
            engine.hset(b"h", f.as_bytes(), b"v").unwrap();
        }
        assert_eq!(engine.hdel(b"h", &["a", "b", "missing", "a"]).unwrap(), 2);
        assert_eq!(engine.hget(b"h", b"a").unwrap(), None);
        assert_eq!(engine.hget(b"h", b"b").unwrap(), None);
        assert_eq!(engine.hsize(b"h").unwrap(), 1);

        assert_eq!(engine.hdel(b"h", &["a"]).unwrap(), 0);
        assert_eq!(engine.hdel(b"h", &["c"]).unwrap(), 1);
        assert_eq!(engine.hsize(b"h").unwrap(), 0);
        // Last field gone: the name is free again
        assert_eq!(engine.counters().resolve_kind(b"h").unwrap(), None);
        assert_eq!(engine.hdel(b"absent", &["x"]).unwrap(), 0);
    }

    #[test]
    fn test_hincr_sums() {
        let engine = memory_engine();
        assert_eq!(engine.hincr(b"h", b"c", 5).unwrap(), 5);
        assert_eq!(engine.hincr(b"h", b"c", -2).unwrap(), 3);
        assert_eq!(engine.hget(b"h", b"c").unwrap(), Some(b("3")));
        assert_eq!(engine.hsize(b"h").unwrap(), 1);
        assert_eq!(engine.hincr(b"h", b"z", 0).unwrap(), 0);
        assert_eq!(engine.hsize(b"h").unwrap(), 2);
    }

    #[test]
    fn test_hincr_overflow_and_underflow_leave_value() {
        let engine = memory_engine();
        engine.hset(b"h", b"max", i64::MAX.to_string().as_bytes()).unwrap();
        engine.hset(b"h", b"min", i64::MIN.to_string().as_bytes()).unwrap();
        let seq = engine.binlog().last_seq();

        assert_eq!(engine.hincr(b"h", b"max", 1), Err(HashError::Overflow));
        assert_eq!(engine.hincr(b"h", b"min", -1), Err(HashError::Underflow));
        assert_eq!(
            engine.hget(b"h", b"max").unwrap(),
            Some(b(&i64::MAX.to_string()))
        );
        assert_eq!(
            engine.hget(b"h", b"min").unwrap(),
            Some(b(&i64::MIN.to_string()))
        );
        assert_eq!(engine.binlog().last_seq(), seq);
    }

    #[test]
    fn test_hincr_invalid_stored_value() {
        let engine = memory_engine();
        engine.hset(b"h", b"f", b"abc").unwrap();
        assert_eq!(engine.hincr(b"h", b"f", 1), Err(HashError::InvalidInt));
        engine.hset(b"h", b"g", b" 12").unwrap();
        assert_eq!(engine.hincr(b"h", b"g", 1), Err(HashError::InvalidInt));
        assert_eq!(engine.hget(b"h", b"f").unwrap(), Some(b("abc")));
    }

    #[test]
    fn test_hincrbyfloat() {
        let engine = memory_engine();
        assert_eq!(engine.hincrbyfloat(b"h", b"f", 1.5).unwrap(), "1.5");
        assert_eq!(engine.hincrbyfloat(b"h", b"f", 0.25).unwrap(), "1.75");
        assert_eq!(engine.hincrbyfloat(b"h", b"f", -1.75).unwrap(), "0");
        assert_eq!(engine.hget(b"h", b"f").unwrap(), Some(b("0")));

        engine.hset(b"h", b"i", b"10").unwrap();
        assert_eq!(engine.hincrbyfloat(b"h", b"i", 0.5).unwrap(), "10.5");

        engine.hset(b"h", b"bad", b"x1").unwrap();
        assert_eq!(
            engine.hincrbyfloat(b"h", b"bad", 1.0),
            Err(HashError::InvalidFloat)
        );
        engine.hset(b"h", b"nan", b"NaN").unwrap();
        assert_eq!(
            engine.hincrbyfloat(b"h", b"nan", 1.0),
            Err(HashError::InvalidFloat)
        );
        assert_eq!(
            engine.hincrbyfloat(b"h", b"f", f64::INFINITY),
            Err(HashError::InvalidFloat)
        );

        engine.hset(b"h", b"big", f64::MAX.to_string().as_bytes()).unwrap();
        assert_eq!(
            engine.hincrbyfloat(b"h", b"big", f64::MAX),
            Err(HashError::Overflow)
        );
    }

    #[test]
    fn test_hincrbyfloat_rejects_padded_value() {
        let engine = memory_engine();
        engine.hset(b"h", b"lead", b" 1.5").unwrap();
        engine.hset(b"h", b"trail", b"1.5\n").unwrap();
        assert_eq!(
            engine.hincrbyfloat(b"h", b"lead", 1.0),
            Err(HashError::InvalidFloat)
        );
        assert_eq!(
            engine.hincrbyfloat(b"h", b"trail", 1.0),
            Err(HashError::InvalidFloat)
        );
        assert_eq!(engine.hget(b"h", b"lead").unwrap(), Some(b(" 1.5")));
    }

    #[test]
    fn test_format_decimal() {
        assert_eq!(format_decimal(0.0), "0");
        assert_eq!(format_decimal(-0.0), "0");
        assert_eq!(format_decimal(3.0), "3");
        assert_eq!(format_decimal(-2.5), "-2.5");
        assert_eq!(format_decimal(0.1 + 0.2), "0.3");
        assert_eq!(format_decimal(1e-16), "0");
        assert_eq!(format_decimal(-1e-16), "0");
        assert_eq!(format_decimal(1234567.125), "1234567.125");
    }

    #[test]
    fn test_hclear() {
        let engine = memory_engine();
        for i in 0..2000 {
            engine
                .hset(b"h", format!("f{}", i).as_bytes(), b"v")
                .unwrap();
        }
        engine.hset(b"other", b"f", b"v").unwrap();

        assert_eq!(engine.hclear(b"h").unwrap(), 2000);
        assert_eq!(engine.hsize(b"h").unwrap(), 0);
        assert!(engine.hgetall(b"h").unwrap().is_empty());
        assert_eq!(engine.hsize(b"other").unwrap(), 1);
        assert_eq!(engine.hclear(b"h").unwrap(), 0);
    }

    #[test]
    fn test_wrong_type_changes_nothing() {
        let engine = memory_engine();
        bind_kind(&engine, ContainerKind::Kv, b"k");
        let before = engine.store().len();

        assert_eq!(engine.hset(b"k", b"f", b"v"), Err(HashError::WrongType));
        assert_eq!(engine.hsetnx(b"k", b"f", b"v"), Err(HashError::WrongType));
        assert_eq!(engine.hmset(b"k", &[("f", "v")]), Err(HashError::WrongType));
        assert_eq!(engine.hdel(b"k", &["f"]), Err(HashError::WrongType));
        assert_eq!(engine.hincr(b"k", b"f", 1), Err(HashError::WrongType));
        assert_eq!(
            engine.hincrbyfloat(b"k", b"f", 1.0),
            Err(HashError::WrongType)
        );
        assert_eq!(engine.hclear(b"k"), Err(HashError::WrongType));

        assert_eq!(engine.store().len(), before);
        assert_eq!(engine.binlog().last_seq(), 0);
    }

    #[test]
    fn test_binlog_records_per_mutated_field() {
        let engine = memory_engine();
        engine.hset(b"h", b"a", b"1").unwrap();
        engine.hmset(b"h", &[("b", "2"), ("c", "3")]).unwrap();
        engine.hdel(b"h", &["a"]).unwrap();

        let records = records(&engine);
        let seqs: Vec<u64> = records.iter().map(|r| r.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4]);
        let commands: Vec<CommandKind> = records.iter().map(|r| r.command).collect();
        assert_eq!(
            commands,
            vec![
                CommandKind::HSet,
                CommandKind::HSet,
                CommandKind::HSet,
                CommandKind::HDel
            ]
        );
        assert_eq!(records[0].key, encode_field_key(b"h", b"a"));
        assert_eq!(records[0].value, b"1".to_vec());
        assert_eq!(records[3].key, encode_field_key(b"h", b"a"));
        assert!(records[3].value.is_empty());
    }

    #[test]
    fn test_end_to_end_sequence() {
        let engine = memory_engine();
        engine.hset(b"h", b"a", b"1").unwrap();
        engine.hset(b"h", b"b", b"2").unwrap();
        assert_eq!(engine.hsize(b"h").unwrap(), 2);
        assert_eq!(
            engine.hgetall(b"h").unwrap(),
            vec![(b("a"), b("1")), (b("b"), b("2"))]
        );
        assert_eq!(engine.hdel(b"h", &["a"]).unwrap(), 1);
        assert_eq!(engine.hsize(b"h").unwrap(), 1);
        assert_eq!(engine.hincr(b"h", b"c", 5).unwrap(), 5);
        assert_eq!(engine.hincr(b"h", b"c", -2).unwrap(), 3);
    }
}
