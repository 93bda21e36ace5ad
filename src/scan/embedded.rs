use aho_corasick::AhoCorasick;
use regex::bytes::Regex;

use crate::error::{IntakeShieldError, Result};

use super::{ScanCheck, ScanSubject, ThreatKind};

const PHP_OPEN_TAGS: &[&str] = &["<?php", "<?="];
const SVG_SCRIPT_MARKERS: &[&str] = &["<script", "javascript:"];
const EXECUTABLE_CALL_PATTERN: &str = r"(?i-u)\b(eval|exec|system|shell_exec|passthru|assert)\s*\(";

/// Full-content search for code hidden inside images and SVG documents.
pub struct EmbeddedContentCheck {
    image_extensions: Vec<String>,
    php: AhoCorasick,
    svg_script: AhoCorasick,
    executable_call: Regex,
}

impl EmbeddedContentCheck {
    pub fn new(image_extensions: Vec<String>) -> Result<Self> {
        let literal = |patterns: &[&str]| {
            AhoCorasick::builder()
                .ascii_case_insensitive(true)
                .build(patterns)
                .map_err(|e| IntakeShieldError::InvalidRule {
                    reason: format!("invalid embedded-content pattern: {e}"),
                })
        };
        Ok(Self {
            image_extensions: image_extensions
                .into_iter()
                .map(|e| e.to_ascii_lowercase())
                .collect(),
            php: literal(PHP_OPEN_TAGS)?,
            svg_script: literal(SVG_SCRIPT_MARKERS)?,
            executable_call: Regex::new(EXECUTABLE_CALL_PATTERN).map_err(|e| {
                IntakeShieldError::InvalidRule {
                    reason: format!("invalid embedded-content pattern: {e}"),
                }
            })?,
        })
    }

    fn applies_to(&self, subject: &ScanSubject<'_>) -> bool {
        subject.is_svg()
            || self.image_extensions.iter().any(|e| e == subject.extension)
            || subject
                .declared_mime
                .is_some_and(|mime| mime.starts_with("image/"))
    }
}

impl ScanCheck for EmbeddedContentCheck {
    fn inspect(&self, subject: &ScanSubject<'_>) -> Vec<ThreatKind> {
        if !self.applies_to(subject) {
            return Vec::new();
        }
        let mut found = Vec::new();
        if self.php.is_match(subject.content) {
            found.push(ThreatKind::EmbeddedPhp);
        }
        if subject.is_svg() && self.svg_script.is_match(subject.content) {
            found.push(ThreatKind::EmbeddedJavascript);
        }
        if self.executable_call.is_match(subject.content) {
            found.push(ThreatKind::EmbeddedExecutableCall);
        }
        found
    }

    fn name(&self) -> &str {
        "embedded"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScannerConfig;

    fn inspect(extension: &str, content: &[u8]) -> Vec<ThreatKind> {
        let check = EmbeddedContentCheck::new(ScannerConfig::default().image_extensions).unwrap();
        let subject = ScanSubject {
            name: "f",
            extension,
            declared_mime: None,
            declared_size: content.len() as u64,
            content,
            header: &content[..content.len().min(512)],
        };
        check.inspect(&subject)
    }

    #[test]
    fn php_in_jpeg_comment() {
        let mut content = b"\xff\xd8\xff\xe0 JFIF".to_vec();
        content.extend_from_slice(b"<?= `id` ?>");
        assert_eq!(inspect("jpg", &content), vec![ThreatKind::EmbeddedPhp]);
    }

    #[test]
    fn svg_script_flagged() {
        let svg = b"<svg xmlns=\"http://www.w3.org/2000/svg\"><SCRIPT>alert(1)</SCRIPT></svg>";
        assert_eq!(inspect("svg", svg), vec![ThreatKind::EmbeddedJavascript]);
    }

    #[test]
    fn svg_javascript_href_flagged() {
        let svg = b"<svg><a href=\"javascript:alert(1)\"><text>x</text></a></svg>";
        assert_eq!(inspect("svg", svg), vec![ThreatKind::EmbeddedJavascript]);
    }

    #[test]
    fn script_in_png_is_not_svg_rule() {
        let mut content = b"\x89PNG\r\n\x1a\n".to_vec();
        content.extend_from_slice(b"<script>alert(1)</script>");
        assert!(!inspect("png", &content).contains(&ThreatKind::EmbeddedJavascript));
    }

    #[test]
    fn executable_call_in_gif() {
        let mut content = b"GIF89a".to_vec();
        content.extend_from_slice(b"\x00\x01 system ('ls');");
        assert_eq!(inspect("gif", &content), vec![ThreatKind::EmbeddedExecutableCall]);
    }

    #[test]
    fn non_images_skipped() {
        assert!(inspect("txt", b"<?php eval($x);").is_empty());
    }
}
