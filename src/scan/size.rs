use std::collections::BTreeMap;

use super::{ScanCheck, ScanSubject, ThreatKind};

/// Per-extension size ceilings and a floor for images.
pub struct SizeCheck {
    limits: BTreeMap<String, u64>,
    image_extensions: Vec<String>,
    min_image_bytes: u64,
}

impl SizeCheck {
    pub fn new(
        limits: BTreeMap<String, u64>,
        image_extensions: Vec<String>,
        min_image_bytes: u64,
    ) -> Self {
        Self {
            limits: limits
                .into_iter()
                .map(|(ext, limit)| (ext.to_ascii_lowercase(), limit))
                .collect(),
            image_extensions: image_extensions
                .into_iter()
                .map(|e| e.to_ascii_lowercase())
                .collect(),
            min_image_bytes,
        }
    }
}

impl ScanCheck for SizeCheck {
    fn inspect(&self, subject: &ScanSubject<'_>) -> Vec<ThreatKind> {
        let size = subject.effective_size();
        let mut found = Vec::new();

        if let Some(&limit) = self.limits.get(subject.extension) {
            if size > limit {
                tracing::debug!(size, limit, extension = subject.extension, "upload over size ceiling");
                found.push(ThreatKind::SizeAnomaly);
            }
        }

        // Empty content is reported by the signature check instead.
        let is_image = self.image_extensions.iter().any(|e| e == subject.extension);
        if is_image && !subject.content.is_empty() && size < self.min_image_bytes {
            found.push(ThreatKind::SuspiciouslySmall);
        }
        found
    }

    fn name(&self) -> &str {
        "size"
    }
}
