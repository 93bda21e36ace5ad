use std::collections::HashSet;

use regex::Regex;

use crate::error::{IntakeShieldError, Result};

use super::{ScanCheck, ScanSubject, ThreatKind};

/// Script extension hidden behind an image extension.
pub const DOUBLE_EXTENSION_PATTERN: &str =
    r"(?i)\.(php\d?|phtml|pl|py|jsp|asp|aspx|sh|cgi)\.(jpg|jpeg|png|gif)$";

/// Well-known web shell and configuration file names.
pub const SUSPICIOUS_FILENAMES: &[&str] = &[
    "shell.php",
    "c99.php",
    "r57.php",
    "wso.php",
    "b374k.php",
    "webshell.php",
    "cmd.php",
    "backdoor.php",
    "wp-config.php",
    "config.php",
    ".htaccess",
    ".htpasswd",
    "web.config",
];

const MAX_NAME_BYTES: usize = 255;

/// Declared-filename heuristics.
pub struct FilenameCheck {
    double_extension: Regex,
    suspicious: HashSet<&'static str>,
}

impl FilenameCheck {
    pub fn new() -> Result<Self> {
        let double_extension =
            Regex::new(DOUBLE_EXTENSION_PATTERN).map_err(|e| IntakeShieldError::InvalidRule {
                reason: format!("invalid filename pattern: {e}"),
            })?;
        Ok(Self {
            double_extension,
            suspicious: SUSPICIOUS_FILENAMES.iter().copied().collect(),
        })
    }
}

impl ScanCheck for FilenameCheck {
    fn inspect(&self, subject: &ScanSubject<'_>) -> Vec<ThreatKind> {
        let base = subject.name.rsplit(['/', '\\']).next().unwrap_or(subject.name);
        let mut found = Vec::new();

        if self.double_extension.is_match(base) {
            found.push(ThreatKind::DoubleExtension);
        }
        if self.suspicious.contains(base.to_lowercase().as_str()) {
            found.push(ThreatKind::SuspiciousFilename);
        }
        if subject.name.len() > MAX_NAME_BYTES {
            found.push(ThreatKind::FilenameTooLong);
        }
        found
    }

    fn name(&self) -> &str {
        "filename"
    }
}
