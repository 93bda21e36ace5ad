pub mod events;
pub mod sanitize;
pub mod scan;

use std::path::PathBuf;

use crate::config::{dirs_global, ShieldConfig};
use crate::error::Result;
use crate::events::SecurityEventLog;
use crate::storage::JsonFileStore;

/// Directory holding the file-backed event store.
pub fn events_dir() -> PathBuf {
    dirs_global().join("events")
}

/// Open the event log shared by every CLI invocation.
pub fn open_event_log(config: &ShieldConfig) -> Result<SecurityEventLog<JsonFileStore>> {
    let store = JsonFileStore::open(events_dir())?;
    Ok(SecurityEventLog::new(store, config.events.clone()))
}
