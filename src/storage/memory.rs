use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;

use crate::error::Result;

use super::{keep_newest, EventStore, PURGE_EVERY_WRITES};

#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    /// `None` when the TTL overflows `Instant`.
    expires_at: Option<Instant>,
}

impl Slot {
    fn new(value: Value, now: Instant, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: now.checked_add(ttl),
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |deadline| deadline > now)
    }
}

/// Process-local store on a concurrent map with per-entry deadlines.
/// Expired entries are dropped on access and swept every
/// `PURGE_EVERY_WRITES` writes, so keys that are never read again do not
/// accumulate.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Slot>,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|slot| slot.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries held, including expired ones not yet swept.
    pub fn raw_len(&self) -> usize {
        self.entries.len()
    }

    /// Remove every expired entry.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, slot| slot.is_live(now));
    }

    // Must not be called while holding an entry guard: `retain` locks every shard.
    fn note_write(&self) {
        let count = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if count % PURGE_EVERY_WRITES == 0 {
            self.purge_expired();
        }
    }
}

impl EventStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(slot) if slot.is_live(now) => return Ok(Some(slot.value.clone())),
            Some(_) => {}
            None => return Ok(None),
        }
        self.entries.remove_if(key, |_, slot| !slot.is_live(now));
        Ok(None)
    }

    fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        self.entries
            .insert(key.to_string(), Slot::new(value, Instant::now(), ttl));
        self.note_write();
        Ok(())
    }

    /// Holds the entry's shard lock for the whole update, so concurrent
    /// appends to one key never lose records.
    fn append_bounded(
        &self,
        key: &str,
        record: Value,
        cap: usize,
        ttl: Duration,
    ) -> Result<Vec<Value>> {
        let now = Instant::now();
        let items = {
            let mut slot = self
                .entries
                .entry(key.to_string())
                .or_insert_with(|| Slot::new(Value::Array(Vec::new()), now, ttl));

            if !slot.is_live(now) || !slot.value.is_array() {
                slot.value = Value::Array(Vec::new());
            }
            let items = match &mut slot.value {
                Value::Array(items) => {
                    items.push(record);
                    keep_newest(items, cap);
                    items.clone()
                }
                _ => Vec::new(),
            };
            slot.expires_at = now.checked_add(ttl);
            items
        };
        self.note_write();
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn get_put_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.get("k").unwrap().is_none());
        store.put("k", json!({"a": 1}), HOUR).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(json!({"a": 1})));
    }

    #[test]
    fn zero_ttl_expires_immediately() {
        let store = MemoryStore::new();
        store.put("k", json!(true), Duration::ZERO).unwrap();
        assert!(store.get("k").unwrap().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn append_bounded_evicts_oldest() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.append_bounded("list", json!(i), 3, HOUR).unwrap();
        }
        assert_eq!(store.get("list").unwrap(), Some(json!([2, 3, 4])));
    }

    #[test]
    fn append_replaces_non_array_value() {
        let store = MemoryStore::new();
        store.put("list", json!("oops"), HOUR).unwrap();
        let items = store.append_bounded("list", json!(1), 3, HOUR).unwrap();
        assert_eq!(items, vec![json!(1)]);
    }

    #[test]
    fn concurrent_appends_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        store
                            .append_bounded("shared", json!([t, i]), 1000, HOUR)
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let items = store.get("shared").unwrap().unwrap();
        assert_eq!(items.as_array().map(Vec::len), Some(200));
    }

    #[test]
    fn writes_sweep_keys_that_are_never_read() {
        let store = MemoryStore::new();
        for i in 0..1000 {
            store
                .append_bounded(&format!("ip:{i}"), json!(i), 10, Duration::ZERO)
                .unwrap();
        }
        assert!(store.raw_len() < PURGE_EVERY_WRITES as usize);
        assert!(store.is_empty());
    }

    #[test]
    fn purge_drops_expired() {
        let store = MemoryStore::new();
        store.put("old", json!(1), Duration::ZERO).unwrap();
        store.put("new", json!(2), HOUR).unwrap();
        store.purge_expired();
        assert_eq!(store.len(), 1);
    }
}
