use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum IntakeShieldError {
    #[error("config parse error in {path}: {reason}")]
    ConfigParse { path: PathBuf, reason: String },

    #[error("invalid rule: {reason}")]
    InvalidRule { reason: String },

    #[error("store error: {reason}")]
    Store { reason: String },

    #[error("glob pattern error: {pattern}: {reason}")]
    GlobPattern { pattern: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, IntakeShieldError>;
