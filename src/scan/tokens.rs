use aho_corasick::AhoCorasick;

use crate::error::{IntakeShieldError, Result};

use super::{ScanCheck, ScanSubject, ThreatKind};

/// Literal search of the header for risky call names via aho-corasick.
/// Any number of hits yields a single `SuspiciousFunctionCall`.
pub struct SuspiciousTokenCheck {
    automaton: AhoCorasick,
    tokens: Vec<String>,
}

impl SuspiciousTokenCheck {
    pub fn new(tokens: Vec<String>) -> Result<Self> {
        let automaton = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(&tokens)
            .map_err(|e| IntakeShieldError::InvalidRule {
                reason: format!("invalid token pattern: {e}"),
            })?;
        Ok(Self { automaton, tokens })
    }

    /// Default risky call names.
    pub fn default_tokens() -> Vec<String> {
        vec![
            // PHP command execution
            "eval(".into(),
            "exec(".into(),
            "system(".into(),
            "shell_exec(".into(),
            "passthru(".into(),
            "popen(".into(),
            "proc_open(".into(),
            "pcntl_exec(".into(),
            // Obfuscation helpers
            "base64_decode(".into(),
            "assert(".into(),
            "create_function(".into(),
        ]
    }
}

impl ScanCheck for SuspiciousTokenCheck {
    fn inspect(&self, subject: &ScanSubject<'_>) -> Vec<ThreatKind> {
        if self.tokens.is_empty() {
            return Vec::new();
        }
        match self.automaton.find(subject.header) {
            Some(mat) => {
                tracing::debug!(token = %self.tokens[mat.pattern().as_usize()], "risky call in header");
                vec![ThreatKind::SuspiciousFunctionCall]
            }
            None => Vec::new(),
        }
    }

    fn name(&self) -> &str {
        "tokens"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inspect(content: &[u8]) -> Vec<ThreatKind> {
        let check = SuspiciousTokenCheck::new(SuspiciousTokenCheck::default_tokens()).unwrap();
        let subject = ScanSubject {
            name: "x.txt",
            extension: "txt",
            declared_mime: None,
            declared_size: content.len() as u64,
            content,
            header: &content[..content.len().min(512)],
        };
        check.inspect(&subject)
    }

    #[test]
    fn flags_once_for_many_tokens() {
        assert_eq!(
            inspect(b"x = EVAL($_POST['a']); system('ls'); exec('id');"),
            vec![ThreatKind::SuspiciousFunctionCall]
        );
    }

    #[test]
    fn flags_base64_decode() {
        assert_eq!(
            inspect(b"$p = base64_decode('ZXZpbA==');"),
            vec![ThreatKind::SuspiciousFunctionCall]
        );
    }

    #[test]
    fn ignores_plain_words() {
        assert!(inspect(b"The evaluation system executes nightly.").is_empty());
    }

    #[test]
    fn only_header_is_searched() {
        let mut content = vec![b'a'; 600];
        content.extend_from_slice(b"eval(");
        assert!(inspect(&content).is_empty());
    }
}
