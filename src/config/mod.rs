pub mod filters;
pub mod policy;

pub use filters::*;
pub use policy::*;

use std::path::PathBuf;

/// Returns the state directory: `$INTAKE_SHIELD_HOME`, else `~/.config/intake-shield/`.
pub fn dirs_global() -> PathBuf {
    if let Ok(dir) = std::env::var("INTAKE_SHIELD_HOME") {
        return PathBuf::from(dir);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(home).join(".config").join("intake-shield")
}
