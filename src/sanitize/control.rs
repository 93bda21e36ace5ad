use super::Sanitizer;

/// Strips NUL and C0 control characters (plus DEL), keeping newline and tab.
/// Carriage returns are folded into newlines.
pub struct ControlCharSanitizer;

impl Sanitizer for ControlCharSanitizer {
    fn sanitize(&self, input: &str) -> String {
        let normalized = input.replace("\r\n", "\n").replace('\r', "\n");
        normalized
            .chars()
            .filter(|&c| c == '\n' || c == '\t' || !(c < '\x20' || c == '\x7f'))
            .collect()
    }

    fn name(&self) -> &str {
        "control-chars"
    }
}
