use aho_corasick::AhoCorasick;

use crate::error::{IntakeShieldError, Result};

use super::Sanitizer;

/// Literal removal of dangerous URI scheme prefixes via aho-corasick.
/// Matching is ASCII case-insensitive and repeated until no match remains,
/// so nested payloads such as `javajavascript:script:` cannot reassemble.
pub struct SchemeSanitizer {
    automaton: AhoCorasick,
    schemes: Vec<String>,
}

impl SchemeSanitizer {
    /// Build from a list of scheme prefixes (e.g. `javascript:`).
    pub fn new(schemes: Vec<String>) -> Result<Self> {
        let automaton = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(&schemes)
            .map_err(|e| IntakeShieldError::InvalidRule {
                reason: format!("invalid scheme pattern: {e}"),
            })?;
        Ok(Self { automaton, schemes })
    }

    /// Default dangerous scheme prefixes stripped from free text.
    pub fn default_schemes() -> Vec<String> {
        vec!["javascript:".into(), "vbscript:".into(), "data:".into()]
    }

    /// Whether the input still contains any of the schemes.
    pub fn is_match(&self, input: &str) -> bool {
        !self.schemes.is_empty() && self.automaton.is_match(input)
    }
}

impl Sanitizer for SchemeSanitizer {
    fn sanitize(&self, input: &str) -> String {
        if self.schemes.is_empty() {
            return input.to_string();
        }

        let empty = vec![""; self.schemes.len()];
        let mut result = input.to_string();
        // Each pass strictly shortens the string, so this terminates.
        while self.automaton.is_match(&result) {
            result = self.automaton.replace_all(&result, &empty);
        }
        result
    }

    fn name(&self) -> &str {
        "schemes"
    }
}
