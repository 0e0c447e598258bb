//! Binlog (replication log) implementation
//!
//! Record format:
//! - Key: `\x01{seq: u64 BE}` so records sort by sequence
//! - Value: `BinlogRecord` serialized with bincode
//! - Last assigned sequence: `M:binlog_seq`, rewritten in every batch
//!
//! Records are written in the same atomic batch as the data change that
//! produced them, so a replica never observes one without the other.
//!
//! ## Lock Strategy
//!
//! `state` is a mutex held from sequence assignment until the batch is
//! applied. Commits are therefore totally ordered, and a failed apply leaves
//! the state untouched, so sequences are never duplicated, inverted or reused.
//!
//! ## Retention
//!
//! With a non-zero `capacity`, each commit deletes every record older than
//! the newest `capacity` ones, starting from the oldest retained sequence.
//! A backlog left by a larger capacity is trimmed by the next commit.

use crate::batch::Batch;
use crate::config::BinlogConfig;
use crate::error::HashResult;
use crate::key_encoding::{
    binlog_seq_key, decode_binlog_key, encode_binlog_key, prefix_successor, DecodeError, KeyTag,
};
use crate::traits::{OrderedStore, StoreError, WriteOp};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::ops::Bound;
use std::sync::Arc;
use tracing::{debug, info};

/// Replication mode stamped on each record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ReplicationKind {
    /// Command synchronization
    #[default]
    Sync = 1,
    /// Master-slave mirroring
    Mirror = 2,
}

/// Mutation carried by a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum CommandKind {
    /// Field written; value holds the new field value
    HSet = 3,
    /// Field removed; value is empty
    HDel = 4,
}

/// One applied mutation, as consumed by replication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinlogRecord {
    pub seq: u64,
    pub kind: ReplicationKind,
    pub command: CommandKind,
    /// Encoded field key
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl BinlogRecord {
    fn encode(&self) -> HashResult<Vec<u8>> {
        bincode::serde::encode_to_vec(self, bincode::config::standard()).map_err(|e| {
            StoreError::Internal(format!("Failed to serialize binlog record: {}", e)).into()
        })
    }

    fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map(|(record, _)| record)
            .map_err(|e| DecodeError::InvalidRecord(e.to_string()))
    }
}

/// Binlog emitter and reader
pub struct Binlog<S: OrderedStore + ?Sized> {
    store: Arc<S>,
    config: BinlogConfig,
    /// Sequence bounds; the lock also serializes commits
    state: Mutex<SeqState>,
}

#[derive(Debug, Clone, Copy)]
struct SeqState {
    /// Last committed sequence
    last: u64,
    /// Oldest sequence not yet trimmed (`last + 1` when nothing is retained)
    first: u64,
}

impl<S: OrderedStore + ?Sized> Binlog<S> {
    /// Open the binlog, restoring the last assigned sequence from the store
    pub fn open(store: Arc<S>, config: BinlogConfig) -> HashResult<Self> {
        let last_seq = match store.get(&binlog_seq_key())? {
            Some(raw) => {
                let bytes: [u8; 8] = raw.as_ref().try_into().map_err(|_| {
                    DecodeError::InvalidRecord(format!("binlog_seq has {} bytes", raw.len()))
                })?;
                u64::from_be_bytes(bytes)
            }
            None => 0,
        };
        let first_seq = match store.scan(
            Bound::Excluded(encode_binlog_key(0).as_slice()),
            Bound::Included(encode_binlog_key(u64::MAX).as_slice()),
            1,
        )?
        .first()
        {
            Some((key, _)) => decode_binlog_key(key)?,
            None => last_seq + 1,
        };

        info!(
            "Binlog opened: first_seq={}, last_seq={}, enabled={}, capacity={}",
            first_seq, last_seq, config.enabled, config.capacity
        );

        Ok(Self {
            store,
            config,
            state: Mutex::new(SeqState {
                last: last_seq,
                first: first_seq,
            }),
        })
    }

    /// Replication kind stamped on new records
    pub fn kind(&self) -> ReplicationKind {
        self.config.kind
    }

    /// Last committed sequence (0 before the first record)
    pub fn last_seq(&self) -> u64 {
        self.state.lock().last
    }

    /// Assign sequences to the batch's records and apply everything atomically
    ///
    /// Returns the last committed sequence after this batch.
    pub fn commit(&self, batch: Batch) -> HashResult<u64> {
        let mut state = self.state.lock();
        if batch.is_empty() {
            return Ok(state.last);
        }

        let (mut ops, records) = batch.into_parts();
        let mut seq = state.last;
        let mut first = state.first;
        if self.config.enabled && !records.is_empty() {
            for pending in records {
                seq += 1;
                let record = BinlogRecord {
                    seq,
                    kind: pending.kind,
                    command: pending.command,
                    key: pending.key,
                    value: pending.value,
                };
                ops.push(WriteOp::put(encode_binlog_key(seq), record.encode()?));
            }
            // Keep the newest `capacity` records; deletes follow the puts so
            // a record both added and trimmed here ends up absent
            let capacity = self.config.capacity;
            if capacity > 0 && seq.saturating_sub(first) >= capacity {
                let keep_from = seq - capacity + 1;
                for old in first..keep_from {
                    ops.push(WriteOp::delete(encode_binlog_key(old)));
                }
                first = keep_from;
            }
            ops.push(WriteOp::put(binlog_seq_key(), seq.to_be_bytes().to_vec()));
        }

        let op_count = ops.len();
        self.store.atomic_apply(ops)?;
        state.last = seq;
        state.first = first;
        debug!("Committed batch: {} ops, last_seq={}", op_count, seq);
        Ok(seq)
    }

    /// Records with sequence greater than `seq`, ascending, at most `limit`
    pub fn records_after(&self, seq: u64, limit: usize) -> HashResult<Vec<BinlogRecord>> {
        let lower = encode_binlog_key(seq);
        let upper = prefix_successor(&[KeyTag::Binlog.as_byte()]);
        let upper_bound = match &upper {
            Some(end) => Bound::Excluded(end.as_slice()),
            None => Bound::Unbounded,
        };

        let rows = self
            .store
            .scan(Bound::Excluded(lower.as_slice()), upper_bound, limit)?;
        let mut records = Vec::with_capacity(rows.len());
        for (key, value) in rows {
            let key_seq = decode_binlog_key(&key)?;
            let record = BinlogRecord::decode(&value)?;
            if record.seq != key_seq {
                return Err(DecodeError::InvalidRecord(format!(
                    "record seq {} stored under key seq {}",
                    record.seq, key_seq
                ))
                .into());
            }
            records.push(record);
        }
        Ok(records)
    }

    /// Oldest retained sequence, `None` when the binlog is empty
    pub fn first_seq(&self) -> HashResult<Option<u64>> {
        Ok(self.records_after(0, 1)?.first().map(|r| r.seq))
    }
}
