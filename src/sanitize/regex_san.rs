use regex::RegexSet;

use crate::error::{IntakeShieldError, Result};

use super::Sanitizer;

/// Pattern removal via RegexSet: inline event-handler attributes and
/// similar script-bearing constructs.
pub struct RegexSanitizer {
    regex_set: RegexSet,
    patterns: Vec<regex::Regex>,
}

impl RegexSanitizer {
    /// Build from a list of regex pattern strings.
    pub fn new(patterns: Vec<String>) -> Result<Self> {
        let regex_set = RegexSet::new(&patterns).map_err(|e| IntakeShieldError::InvalidRule {
            reason: format!("invalid regex pattern: {e}"),
        })?;
        let compiled: Vec<regex::Regex> = patterns
            .iter()
            .map(|p| {
                regex::Regex::new(p).map_err(|e| IntakeShieldError::InvalidRule {
                    reason: format!("invalid regex pattern: {e}"),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            regex_set,
            patterns: compiled,
        })
    }

    /// Default patterns removed from free text.
    pub fn default_patterns() -> Vec<String> {
        vec![
            // Inline event handlers: onclick=, onerror =, ...
            r"(?i)on\w+\s*=".into(),
            // CSS expression() payloads
            r"(?i)expression\s*\(".into(),
        ]
    }

    /// Whether any pattern still matches.
    pub fn is_match(&self, input: &str) -> bool {
        self.regex_set.is_match(input)
    }
}

impl Sanitizer for RegexSanitizer {
    fn sanitize(&self, input: &str) -> String {
        let mut result = input.to_string();
        // Removal can join fragments into a new match, so repeat until clean.
        loop {
            let matching: Vec<usize> = self.regex_set.matches(&result).into_iter().collect();
            if matching.is_empty() {
                return result;
            }
            for &idx in &matching {
                result = self.patterns[idx].replace_all(&result, "").into_owned();
            }
        }
    }

    fn name(&self) -> &str {
        "regex"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn san() -> RegexSanitizer {
        RegexSanitizer::new(RegexSanitizer::default_patterns()).unwrap()
    }

    #[test]
    fn removes_event_handler() {
        let result = san().sanitize(r#"<img src=x onerror="alert(1)">"#);
        assert!(!result.to_lowercase().contains("onerror"));
    }

    #[test]
    fn removes_spaced_handler() {
        let result = san().sanitize("ONLOAD   = go()");
        assert_eq!(result, " go()");
    }

    #[test]
    fn removes_rejoined_handler() {
        let result = san().sanitize("ononclick=click=x");
        assert!(!san().is_match(&result));
    }

    #[test]
    fn no_match() {
        assert_eq!(san().sanitize("once upon a time"), "once upon a time");
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        assert!(RegexSanitizer::new(vec!["(".into()]).is_err());
    }
}
