//! Tri-state result contract
//!
//! Callers that speak a status-code protocol map every engine result to:
//! - negative: failure, the value of [`HashError::code`]
//! - `0`: success, but false / not found / empty
//! - `1`: success, true / present

use crate::error::HashResult;
use crate::hash::ScanPage;
use bytes::Bytes;

/// Whether a successful result counts as "present"
pub trait Presence {
    fn is_present(&self) -> bool;
}

impl Presence for bool {
    fn is_present(&self) -> bool {
        *self
    }
}

impl Presence for u64 {
    fn is_present(&self) -> bool {
        *self > 0
    }
}

/// Increments always produce a value
impl Presence for i64 {
    fn is_present(&self) -> bool {
        true
    }
}

impl Presence for String {
    fn is_present(&self) -> bool {
        true
    }
}

impl<T> Presence for Option<T> {
    fn is_present(&self) -> bool {
        self.is_some()
    }
}

impl<T> Presence for Vec<T> {
    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

impl Presence for Bytes {
    fn is_present(&self) -> bool {
        true
    }
}

impl Presence for ScanPage {
    fn is_present(&self) -> bool {
        !self.pairs.is_empty()
    }
}

/// Collapse a result into `-N`, `0` or `1`
pub fn tri_state<T: Presence>(result: &HashResult<T>) -> i32 {
    match result {
        Err(e) => e.code(),
        Ok(v) if v.is_present() => 1,
        Ok(_) => 0,
    }
}
