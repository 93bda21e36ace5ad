use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{ShieldConfig, TextConfig};
use crate::error::Result;
use crate::events::{RequestContext, SecurityEventLog};
use crate::sanitize::{self, ContentSanitizer};
use crate::scan::{should_quarantine, FileScanner, ScanResult, UploadedFile};
use crate::storage::EventStore;

/// A sanitized text value and whether sanitizing changed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizationResult {
    pub sanitized_value: String,
    pub modified: bool,
}

/// Outcome of inspecting one upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadVerdict {
    /// Name as declared by the client.
    pub original_name: String,
    /// Normalized name safe to store under.
    pub safe_name: String,
    pub scan: ScanResult,
    /// A critical threat was found; the caller should quarantine the file.
    pub quarantine: bool,
}

impl UploadVerdict {
    pub fn accepted(&self) -> bool {
        self.scan.safe
    }

    /// One user-facing sentence per threat, empty when accepted.
    pub fn rejection_messages(&self) -> Vec<String> {
        self.scan
            .threat_descriptions()
            .into_iter()
            .map(String::from)
            .collect()
    }
}

/// Runs sanitizer, normalizer, scanner and event log along the request flow:
/// sanitize unconditionally, scan files, record rejections and threats.
pub struct InspectionPipeline<S: EventStore> {
    sanitizer: ContentSanitizer,
    scanner: FileScanner,
    events: SecurityEventLog<S>,
    text: TextConfig,
}

impl<S: EventStore> InspectionPipeline<S> {
    pub fn new(config: &ShieldConfig, store: S) -> Result<Self> {
        Ok(Self {
            sanitizer: ContentSanitizer::with_allowed_tags(&config.text.allowed_tags)?,
            scanner: FileScanner::new(&config.scanner)?,
            events: SecurityEventLog::new(store, config.events.clone()),
            text: config.text.clone(),
        })
    }

    pub fn events(&self) -> &SecurityEventLog<S> {
        &self.events
    }

    pub fn scanner(&self) -> &FileScanner {
        &self.scanner
    }

    /// Sanitize a free-text field with the configured limits. Script-bearing
    /// input is recorded as an `xss_attempt`.
    pub fn inspect_text(&self, field: &str, input: &str, ctx: &RequestContext) -> SanitizationResult {
        let sanitized_value =
            self.sanitizer
                .sanitize_text(input, self.text.max_length, self.text.strip_markup);
        let modified = sanitized_value != input;

        if modified && self.sanitizer.is_hostile(input) {
            let mut payload = Map::new();
            payload.insert("field".into(), field.into());
            payload.insert("input_length".into(), input.chars().count().into());
            self.events.record("suspicious", "xss_attempt", ctx, payload);
        }

        SanitizationResult {
            sanitized_value,
            modified,
        }
    }

    /// Validate an email field. Rejections are recorded as `input_rejected`.
    pub fn inspect_email(&self, field: &str, input: &str, ctx: &RequestContext) -> Option<String> {
        let result = sanitize::sanitize_email(input);
        if result.is_none() {
            self.reject_input(field, "invalid_email", ctx);
        }
        result
    }

    /// Validate a URL field. Rejections are recorded as `input_rejected`.
    pub fn inspect_url(&self, field: &str, input: &str, ctx: &RequestContext) -> Option<String> {
        let result = sanitize::sanitize_url(input);
        if result.is_none() {
            self.reject_input(field, "disallowed_url", ctx);
        }
        result
    }

    /// Normalize the name and scan the content. Unsafe files are recorded as
    /// `malicious_file_detected` (critical threats) or `upload_rejected`;
    /// files that could not be inspected also record a `scan_error`.
    pub fn inspect_upload(&self, file: &UploadedFile, ctx: &RequestContext) -> UploadVerdict {
        let safe_name = sanitize::sanitize_filename(&file.declared_name);
        let scan = self.scanner.scan(file);
        let quarantine = should_quarantine(&scan);

        if !scan.safe {
            let mut payload = Map::new();
            payload.insert("filename".into(), safe_name.clone().into());
            payload.insert("size".into(), file.declared_size.into());
            payload.insert(
                "threats".into(),
                Value::Array(scan.threats.iter().map(|t| t.as_str().into()).collect()),
            );
            if let Some(sha256) = &scan.sha256 {
                payload.insert("sha256".into(), sha256.clone().into());
            }

            if scan.threats.iter().any(|t| t.is_infrastructure_failure()) {
                self.events
                    .record("file_upload", "scan_error", ctx, payload.clone());
            }
            let event_name = if quarantine {
                "malicious_file_detected"
            } else {
                "upload_rejected"
            };
            self.events.record("file_upload", event_name, ctx, payload);
        }

        UploadVerdict {
            original_name: file.declared_name.clone(),
            safe_name,
            scan,
            quarantine,
        }
    }

    fn reject_input(&self, field: &str, reason: &str, ctx: &RequestContext) {
        let mut payload = Map::new();
        payload.insert("field".into(), field.into());
        payload.insert("reason".into(), reason.into());
        self.events.record("validation", "input_rejected", ctx, payload);
    }
}
