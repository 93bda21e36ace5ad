pub mod embedded;
pub mod entropy;
pub mod filename;
pub mod signature;
pub mod size;
pub mod tokens;

use std::borrow::Cow;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::ScannerConfig;
use crate::error::Result;

/// A single heuristic finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatKind {
    ExecutableSignature,
    ScriptSignature,
    EmptyFile,
    HighEntropy,
    SuspiciousFunctionCall,
    DoubleExtension,
    SuspiciousFilename,
    FilenameTooLong,
    SizeAnomaly,
    SuspiciouslySmall,
    EmbeddedPhp,
    EmbeddedJavascript,
    EmbeddedExecutableCall,
    FileReadError,
    ScanError,
}

impl ThreatKind {
    /// Threats that make a file eligible for quarantine.
    pub const CRITICAL: &'static [ThreatKind] = &[
        ThreatKind::ExecutableSignature,
        ThreatKind::ScriptSignature,
        ThreatKind::EmbeddedPhp,
        ThreatKind::EmbeddedJavascript,
        ThreatKind::EmbeddedExecutableCall,
    ];

    pub fn is_critical(&self) -> bool {
        Self::CRITICAL.contains(self)
    }

    /// The file could not be inspected, as opposed to being found malicious.
    pub fn is_infrastructure_failure(&self) -> bool {
        matches!(self, ThreatKind::FileReadError | ThreatKind::ScanError)
    }

    /// Stable snake_case tag, as serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatKind::ExecutableSignature => "executable_signature",
            ThreatKind::ScriptSignature => "script_signature",
            ThreatKind::EmptyFile => "empty_file",
            ThreatKind::HighEntropy => "high_entropy",
            ThreatKind::SuspiciousFunctionCall => "suspicious_function_call",
            ThreatKind::DoubleExtension => "double_extension",
            ThreatKind::SuspiciousFilename => "suspicious_filename",
            ThreatKind::FilenameTooLong => "filename_too_long",
            ThreatKind::SizeAnomaly => "size_anomaly",
            ThreatKind::SuspiciouslySmall => "suspiciously_small",
            ThreatKind::EmbeddedPhp => "embedded_php",
            ThreatKind::EmbeddedJavascript => "embedded_javascript",
            ThreatKind::EmbeddedExecutableCall => "embedded_executable_call",
            ThreatKind::FileReadError => "file_read_error",
            ThreatKind::ScanError => "scan_error",
        }
    }

    /// Human-readable explanation shown when an upload is rejected.
    pub fn description(&self) -> &'static str {
        match self {
            ThreatKind::ExecutableSignature => "The file contains an executable program header.",
            ThreatKind::ScriptSignature => "The file starts like a server-side or browser script.",
            ThreatKind::EmptyFile => "The file is empty.",
            ThreatKind::HighEntropy => {
                "The file content looks packed or encrypted, which is unusual for this upload type."
            }
            ThreatKind::SuspiciousFunctionCall => {
                "The file contains code that calls dangerous functions."
            }
            ThreatKind::DoubleExtension => {
                "The file name hides a script extension behind an image extension."
            }
            ThreatKind::SuspiciousFilename => "The file name matches a known malicious file name.",
            ThreatKind::FilenameTooLong => "The file name is longer than 255 bytes.",
            ThreatKind::SizeAnomaly => "The file is larger than allowed for its type.",
            ThreatKind::SuspiciouslySmall => "The file is too small to be a valid image.",
            ThreatKind::EmbeddedPhp => "The file contains embedded PHP code.",
            ThreatKind::EmbeddedJavascript => "The image contains embedded JavaScript.",
            ThreatKind::EmbeddedExecutableCall => "The file contains embedded executable code.",
            ThreatKind::FileReadError => "The file could not be read for inspection.",
            ThreatKind::ScanError => "The file could not be fully inspected.",
        }
    }
}

impl std::fmt::Display for ThreatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of scanning one file. Produced once; never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    /// True iff no threat was flagged.
    pub safe: bool,

    /// Threats in check order, without duplicates.
    pub threats: Vec<ThreatKind>,

    /// Which checks ran, e.g. `heuristic:signature+entropy+...`.
    pub scan_method: String,

    pub scan_timestamp: DateTime<Utc>,

    /// Hex SHA-256 of the full content, when it could be read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,

    #[serde(default)]
    pub bytes_scanned: u64,
}

impl ScanResult {
    pub(crate) fn from_threats(threats: Vec<ThreatKind>, scan_method: String) -> Self {
        Self {
            safe: threats.is_empty(),
            threats,
            scan_method,
            scan_timestamp: Utc::now(),
            sha256: None,
            bytes_scanned: 0,
        }
    }

    pub fn has_threat(&self, kind: ThreatKind) -> bool {
        self.threats.contains(&kind)
    }

    /// Descriptions for every flagged threat, in order.
    pub fn threat_descriptions(&self) -> Vec<&'static str> {
        self.threats.iter().map(ThreatKind::description).collect()
    }
}

/// Caller-side policy: quarantine when any critical threat was flagged.
pub fn should_quarantine(result: &ScanResult) -> bool {
    result.threats.iter().any(ThreatKind::is_critical)
}

/// Where the file's bytes come from.
#[derive(Debug, Clone)]
pub enum FileSource {
    Bytes(Vec<u8>),
    Path(PathBuf),
}

/// An uploaded file as declared by the client.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub source: FileSource,
    pub declared_name: String,
    pub declared_size: u64,
    /// Lowercase extension without the dot. Derived from the name when `None`.
    pub declared_extension: Option<String>,
    pub declared_mime: Option<String>,
}

impl UploadedFile {
    /// An in-memory upload; the declared size is the byte length.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            declared_size: bytes.len() as u64,
            source: FileSource::Bytes(bytes),
            declared_name: name.into(),
            declared_extension: None,
            declared_mime: None,
        }
    }

    /// A file on disk, read lazily at scan time.
    pub fn from_path(path: &Path) -> Self {
        let declared_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let declared_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        Self {
            source: FileSource::Path(path.to_path_buf()),
            declared_name,
            declared_size,
            declared_extension: None,
            declared_mime: None,
        }
    }

    pub fn with_declared_size(mut self, size: u64) -> Self {
        self.declared_size = size;
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.declared_extension = Some(extension.into());
        self
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.declared_mime = Some(mime.into());
        self
    }

    /// Declared extension, or the part of the name after the last dot, lowercased.
    pub fn extension(&self) -> String {
        match &self.declared_extension {
            Some(ext) => ext.trim_start_matches('.').to_ascii_lowercase(),
            None => self
                .declared_name
                .rsplit_once('.')
                .map(|(_, ext)| ext.to_ascii_lowercase())
                .unwrap_or_default(),
        }
    }

    fn read_content(&self) -> Result<Cow<'_, [u8]>> {
        match &self.source {
            FileSource::Bytes(bytes) => Ok(Cow::Borrowed(bytes.as_slice())),
            FileSource::Path(path) => Ok(Cow::Owned(std::fs::read(path)?)),
        }
    }
}

/// Everything a check may look at. Built once per scan.
#[derive(Debug)]
pub struct ScanSubject<'a> {
    pub name: &'a str,
    pub extension: &'a str,
    pub declared_mime: Option<&'a str>,
    pub declared_size: u64,
    pub content: &'a [u8],
    /// The first `header_bytes` of `content`.
    pub header: &'a [u8],
}

impl ScanSubject<'_> {
    /// Larger of declared and actual size.
    pub fn effective_size(&self) -> u64 {
        self.declared_size.max(self.content.len() as u64)
    }

    pub fn is_svg(&self) -> bool {
        self.extension == "svg" || self.declared_mime == Some("image/svg+xml")
    }
}

/// A single heuristic check. Checks are independent and all run.
pub trait ScanCheck: Send + Sync {
    /// Threats found in the subject; empty when clean.
    fn inspect(&self, subject: &ScanSubject<'_>) -> Vec<ThreatKind>;

    /// Name of this check (for `scan_method` and logging).
    fn name(&self) -> &str;
}

/// Single-pass heuristic scanner over a fixed list of checks.
pub struct FileScanner {
    header_bytes: usize,
    checks: Vec<Box<dyn ScanCheck>>,
}

impl FileScanner {
    /// Build the default check list from scanner thresholds.
    pub fn new(config: &ScannerConfig) -> Result<Self> {
        let checks: Vec<Box<dyn ScanCheck>> = vec![
            Box::new(signature::SignatureCheck::new()),
            Box::new(entropy::EntropyCheck::new(
                config.entropy_threshold,
                config.entropy_exempt_extensions.clone(),
            )),
            Box::new(tokens::SuspiciousTokenCheck::new(
                tokens::SuspiciousTokenCheck::default_tokens(),
            )?),
            Box::new(filename::FilenameCheck::new()?),
            Box::new(size::SizeCheck::new(
                config.size_limits.clone(),
                config.image_extensions.clone(),
                config.min_image_bytes,
            )),
            Box::new(embedded::EmbeddedContentCheck::new(
                config.image_extensions.clone(),
            )?),
        ];
        Ok(Self::with_checks(config.header_bytes, checks))
    }

    /// Build from custom checks.
    pub fn with_checks(header_bytes: usize, checks: Vec<Box<dyn ScanCheck>>) -> Self {
        Self {
            header_bytes,
            checks,
        }
    }

    /// Append a check after the built-in ones.
    pub fn push_check(&mut self, check: Box<dyn ScanCheck>) {
        self.checks.push(check);
    }

    /// `heuristic:` followed by the check names joined with `+`.
    pub fn scan_method(&self) -> String {
        let names: Vec<&str> = self.checks.iter().map(|c| c.name()).collect();
        format!("heuristic:{}", names.join("+"))
    }

    /// Scan a file. Never fails: read errors and faults inside a check become
    /// threats, so an uninspected file is never reported safe.
    pub fn scan(&self, file: &UploadedFile) -> ScanResult {
        let content = match file.read_content() {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(file = %file.declared_name, error = %e, "upload unreadable");
                return ScanResult::from_threats(vec![ThreatKind::FileReadError], self.scan_method());
            }
        };

        let extension = file.extension();
        let header = &content[..content.len().min(self.header_bytes)];
        let subject = ScanSubject {
            name: &file.declared_name,
            extension: &extension,
            declared_mime: file.declared_mime.as_deref(),
            declared_size: file.declared_size,
            content: &content,
            header,
        };

        let mut threats: Vec<ThreatKind> = Vec::new();
        for check in &self.checks {
            let found = catch_unwind(AssertUnwindSafe(|| check.inspect(&subject)))
                .unwrap_or_else(|_| {
                    tracing::error!(check = check.name(), file = %file.declared_name, "scan check panicked");
                    vec![ThreatKind::ScanError]
                });
            if !found.is_empty() {
                tracing::debug!(check = check.name(), threats = ?found, "check flagged upload");
            }
            for threat in found {
                if !threats.contains(&threat) {
                    threats.push(threat);
                }
            }
        }

        let mut result = ScanResult::from_threats(threats, self.scan_method());
        result.sha256 = Some(format!("{:x}", Sha256::digest(&content[..])));
        result.bytes_scanned = content.len() as u64;
        result
    }
}
