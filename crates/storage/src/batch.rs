//! Write batch staged by one request
//!
//! Collects the field rows, counter change and binlog records of a single
//! command. Nothing is visible until `Binlog::commit` hands the whole batch to
//! `OrderedStore::atomic_apply`.

use crate::binlog::{CommandKind, ReplicationKind};
use crate::traits::WriteOp;

/// Binlog record waiting for its sequence number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRecord {
    pub kind: ReplicationKind,
    pub command: CommandKind,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct Batch {
    ops: Vec<WriteOp>,
    records: Vec<PendingRecord>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push(WriteOp::Put { key, value });
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.ops.push(WriteOp::Delete { key });
    }

    /// Stage a binlog record for the mutation staged just before it
    pub fn append(
        &mut self,
        kind: ReplicationKind,
        command: CommandKind,
        key: Vec<u8>,
        value: Vec<u8>,
    ) {
        self.records.push(PendingRecord {
            kind,
            command,
            key,
            value,
        });
    }

    /// True when the request changed nothing
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty() && self.records.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub(crate) fn into_parts(self) -> (Vec<WriteOp>, Vec<PendingRecord>) {
        (self.ops, self.records)
    }
}
