use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{IntakeShieldError, Result};

/// Top-level configuration, read from `config.yml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShieldConfig {
    /// Free-text sanitization settings.
    #[serde(default)]
    pub text: TextConfig,

    /// Heuristic file scanner thresholds.
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Security event log buffers and correlation rules.
    #[serde(default)]
    pub events: EventLogConfig,
}

impl ShieldConfig {
    /// Load config from a YAML file. Returns default if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&contents).map_err(|e| IntakeShieldError::ConfigParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Load config from the state directory: `<state dir>/config.yml`.
    pub fn load_default() -> Result<Self> {
        Self::load_from(&super::dirs_global().join("config.yml"))
    }
}

/// Settings for `sanitize_text` / `sanitize_html` as used by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextConfig {
    /// Maximum characters kept in a free-text field. Default: 5000.
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Remove markup outside the allow-list instead of escaping it.
    #[serde(default = "default_true")]
    pub strip_markup: bool,

    /// Element names kept by `sanitize_html`.
    #[serde(default = "default_allowed_tags")]
    pub allowed_tags: Vec<String>,
}

fn default_max_length() -> usize {
    5000
}
fn default_true() -> bool {
    true
}
fn default_allowed_tags() -> Vec<String> {
    crate::sanitize::markup::DEFAULT_ALLOWED_TAGS
        .iter()
        .map(|t| t.to_string())
        .collect()
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            max_length: default_max_length(),
            strip_markup: true,
            allowed_tags: default_allowed_tags(),
        }
    }
}

/// Thresholds for the heuristic scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Bytes inspected by the signature, entropy and token checks.
    pub header_bytes: usize,
    /// Shannon entropy (bits/byte) above which the header is flagged.
    pub entropy_threshold: f64,
    /// Declared extensions for which the entropy check is skipped.
    pub entropy_exempt_extensions: Vec<String>,
    /// Images smaller than this are flagged as suspiciously small.
    pub min_image_bytes: u64,
    /// Extensions treated as images for the small-size and embedded checks.
    pub image_extensions: Vec<String>,
    /// Maximum size in bytes per declared extension.
    pub size_limits: BTreeMap<String, u64>,
}

const MB: u64 = 1024 * 1024;

impl Default for ScannerConfig {
    fn default() -> Self {
        let size_limits = [
            ("jpg", 10 * MB),
            ("jpeg", 10 * MB),
            ("png", 10 * MB),
            ("gif", 5 * MB),
            ("webp", 5 * MB),
            ("svg", MB),
            ("ico", MB),
            ("pdf", 20 * MB),
        ]
        .into_iter()
        .map(|(ext, limit)| (ext.to_string(), limit))
        .collect();

        Self {
            header_bytes: 512,
            entropy_threshold: 7.5,
            entropy_exempt_extensions: Vec::new(),
            min_image_bytes: 100,
            image_extensions: ["jpg", "jpeg", "png", "gif", "webp", "svg", "ico", "bmp"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
            size_limits,
        }
    }
}

/// Bounded buffers and correlation thresholds for the security event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventLogConfig {
    /// Events kept in the global recent-events buffer. Default: 100.
    pub global_capacity: usize,
    /// Events kept per client IP. Default: 10.
    pub per_ip_capacity: usize,
    /// Expiry of both buffers in seconds. Default: 3600.
    pub ttl_secs: u64,
    /// Trailing per-IP events inspected by correlation. Default: 10.
    pub correlation_window: usize,
    /// Login failures in the window that raise `potential_brute_force`.
    pub brute_force_threshold: usize,
    /// Upload/validation/access denials in the window that raise
    /// `suspicious_activity_pattern`.
    pub suspicious_pattern_threshold: usize,
    /// Seconds during which a repeated alert for the same IP is suppressed.
    pub alert_cooldown_secs: u64,
    /// Categories whose records trigger correlation.
    pub correlate_categories: Vec<String>,
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self {
            global_capacity: 100,
            per_ip_capacity: 10,
            ttl_secs: 3600,
            correlation_window: 10,
            brute_force_threshold: 5,
            suspicious_pattern_threshold: 3,
            alert_cooldown_secs: 900,
            correlate_categories: vec!["suspicious".into()],
        }
    }
}
