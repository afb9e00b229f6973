// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! The public verb seam of the storage engine.

use crate::error::Result;

/// Behavior contract of the key-value engine. All operations must be
/// externally serialized; the engine does not multiplex concurrent callers.
pub trait Kernel {
    /// Return the value bytes for `key` as a fresh copy the caller owns.
    fn get(&mut self, key: &[u8]) -> Result<Vec<u8>>;

    /// Insert or overwrite `key` with `value`. Always appends, even when the
    /// key already holds an identical value: last write wins.
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Delete `key`. Returns `false` without touching the disk when the key
    /// is absent, `true` after a tombstone was appended.
    fn remove(&mut self, key: &[u8]) -> Result<bool>;

    /// Delete `key` and return its last value, or `None` if it was absent.
    fn remove_with_get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Membership test. Never touches the disk.
    fn contains(&self, key: &[u8]) -> Result<bool>;
}
