use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{IntakeShieldError, Result};

use super::{EventStore, PURGE_EVERY_WRITES};

/// On-disk envelope: the value and when it stops being valid.
#[derive(Debug, Serialize, Deserialize)]
struct StoredValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    value: Value,
}

/// One JSON file per key under a directory. Writes go through a temp file in
/// the same directory and are renamed into place, so readers never see a
/// partial file. Concurrent writers may lose an update.
///
/// Expired files are removed on read, on `open`, and every
/// `PURGE_EVERY_WRITES` writes.
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    writes: AtomicU64,
}

impl JsonFileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let store = Self {
            dir,
            writes: AtomicU64::new(0),
        };
        store.purge_expired();
        Ok(store)
    }

    /// Remove every expired entry file. Unreadable or corrupt files are left
    /// for `get` to report.
    pub fn purge_expired(&self) -> usize {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %self.dir.display(), error = %e, "cannot sweep store");
                return 0;
            }
        };
        let now = Utc::now();
        let mut removed = 0;
        for path in entries.filter_map(|entry| entry.ok().map(|e| e.path())) {
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let expired = fs::read_to_string(&path)
                .ok()
                .and_then(|raw| serde_json::from_str::<StoredValue>(&raw).ok())
                .is_some_and(|stored| stored.expires_at.is_some_and(|at| at <= now));
            if expired && fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::debug!(removed, "swept expired store entries");
        }
        removed
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", encode_key(key)))
    }
}

/// Injective mapping from a store key to a file stem.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'.' => out.push(byte as char),
            _ => out.push_str(&format!("_{byte:02x}")),
        }
    }
    out
}

impl EventStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.key_path(key);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let stored: StoredValue = serde_json::from_str(&raw)?;
        if stored.expires_at.is_some_and(|at| at <= Utc::now()) {
            if let Err(e) = fs::remove_file(&path) {
                tracing::debug!(path = %path.display(), error = %e, "could not remove expired entry");
            }
            return Ok(None);
        }
        Ok(Some(stored.value))
    }

    fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl));
        let json = serde_json::to_vec(&StoredValue { expires_at, value })?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&json)?;
        tmp.flush()?;
        let path = self.key_path(key);
        tmp.persist(&path).map_err(|e| IntakeShieldError::Store {
            reason: format!("persist {}: {}", path.display(), e.error),
        })?;

        let count = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if count % PURGE_EVERY_WRITES == 0 {
            self.purge_expired();
        }
        Ok(())
    }
}
