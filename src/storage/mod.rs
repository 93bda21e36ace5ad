pub mod json_file;
pub mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

use std::time::Duration;

use serde_json::Value;

use crate::error::Result;

/// Writes between sweeps of expired entries in stores that expire lazily.
pub(crate) const PURGE_EVERY_WRITES: u64 = 256;

/// Expiring key-value backend for the security event buffers.
pub trait EventStore: Send + Sync {
    /// Value stored under `key`, or `None` when absent or expired.
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Store `value` under `key`, replacing any previous value.
    fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<()>;

    /// Append `record` to the array under `key`, dropping the oldest entries
    /// beyond `cap`, and refresh the expiry. Returns the updated array.
    ///
    /// The default is a read-modify-write with no isolation between callers.
    /// Backends that can lock an entry should override it.
    fn append_bounded(
        &self,
        key: &str,
        record: Value,
        cap: usize,
        ttl: Duration,
    ) -> Result<Vec<Value>> {
        let mut items = match self.get(key)? {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };
        items.push(record);
        keep_newest(&mut items, cap);
        self.put(key, Value::Array(items.clone()), ttl)?;
        Ok(items)
    }
}

/// Drop entries from the front until at most `cap` remain.
pub(crate) fn keep_newest(items: &mut Vec<Value>, cap: usize) {
    if items.len() > cap {
        items.drain(..items.len() - cap);
    }
}
